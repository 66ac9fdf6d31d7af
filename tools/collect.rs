//! Story collection driver.
//!
//! Usage: collect --language JP --region Tokyo --type fairy_tale [--count 3]
//!
//! Exit status: 0 when every item succeeded, 1 on configuration or request
//! errors, 2 when at least one batch item failed.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use story_collector::core::fingerprint::DEFAULT_SIMILARITY_THRESHOLD;
use story_collector::core::pipeline::{CollectOutcome, StoryCollector};
use story_collector::core::profiles::ProfileRegistry;
use story_collector::core::template::StoryTemplates;
use story_collector::schema::profile::RequestDefaults;
use story_collector::schema::request::StoryRequest;
use story_collector::store::memory::InMemoryStore;
use story_collector::store::notion::{NotionConfig, NotionStore};
use story_collector::store::StoryStore;

#[derive(Parser, Debug)]
#[command(name = "collect", version, about = "Generate and store children's stories")]
struct Args {
    /// Language code (CN, EN, JP, SP, AR, HI)
    #[arg(short, long)]
    language: String,

    /// City or region registered for the language
    #[arg(short, long)]
    region: String,

    /// Story type, e.g. fairy_tale, myth, folk_tale
    #[arg(short = 't', long = "type")]
    story_type: String,

    /// Number of stories to collect
    #[arg(short, long, default_value_t = 1)]
    count: u32,

    /// Age group; defaults to the profile's
    #[arg(long)]
    age: Option<String>,

    /// Educational themes, comma separated; default to the profile's
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    themes: Vec<String>,

    /// Length label; defaults to the profile's
    #[arg(long)]
    length: Option<String>,

    /// Cultural source; defaults to the profile's
    #[arg(long)]
    source: Option<String>,

    /// Seed for character and setting picks
    #[arg(long)]
    seed: Option<u64>,

    /// Keep stories in memory and print their Markdown instead of saving
    #[arg(long)]
    dry_run: bool,

    /// Skip stories whose content matches a stored story of the same
    /// region and type; optional similarity threshold in 0..=1
    #[arg(long, value_name = "THRESHOLD", num_args = 0..=1)]
    dedup: Option<Option<f64>>,

    /// Directory of profile RON files replacing the bundled profiles
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Extra story templates merged over the bundled ones
    #[arg(long)]
    templates: Option<PathBuf>,
}

impl Args {
    fn request(&self, defaults: &RequestDefaults) -> StoryRequest {
        let mut request = StoryRequest::with_defaults(&self.story_type, &self.region, defaults);
        if let Some(age) = &self.age {
            request.age_group = age.clone();
        }
        if !self.themes.is_empty() {
            request.educational_themes = self.themes.clone();
        }
        if let Some(length) = &self.length {
            request.length = length.clone();
        }
        if let Some(source) = &self.source {
            request.cultural_source = source.clone();
        }
        request
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "story_collector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let registry = match &args.profiles {
        Some(dir) => {
            let mut registry = ProfileRegistry::new();
            registry
                .load_dir(dir)
                .with_context(|| format!("loading profiles from {}", dir.display()))?;
            registry
        }
        None => ProfileRegistry::builtin().context("loading bundled profiles")?,
    };
    let profile = registry.get(&args.language)?.clone();

    let mut templates = StoryTemplates::builtin().context("loading bundled templates")?;
    if let Some(path) = &args.templates {
        let extra = StoryTemplates::load_from_ron(path)
            .with_context(|| format!("loading templates from {}", path.display()))?;
        templates.merge(extra);
    }

    let store: Arc<dyn StoryStore> = if args.dry_run {
        Arc::new(InMemoryStore::new())
    } else {
        let config = NotionConfig::from_env().context("Notion configuration")?;
        Arc::new(NotionStore::new(config)?)
    };

    let request = args.request(&profile.defaults);
    let mut builder = StoryCollector::builder()
        .profile(profile)
        .templates(templates)
        .store(store);
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    if let Some(threshold) = args.dedup {
        builder = builder.dedup(threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD));
    }
    let mut collector = builder.build()?;

    // Request and template problems exit 1 before anything is stored.
    collector.preflight(&request).context("invalid request")?;

    let (mut created, mut existing, mut duplicates) = (0u32, 0u32, 0u32);
    let mut failed = Vec::new();
    for item in 1..=args.count {
        if item > 1 {
            // ids carry a millisecond timestamp
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        match collector.collect(&request).await {
            Ok(CollectOutcome::Created { stored, markdown }) => {
                created += 1;
                println!("[{}/{}] created {} ({})", item, args.count, stored.story.story_id, stored.page_id);
                if args.dry_run {
                    println!("\n{}", markdown);
                }
            }
            Ok(CollectOutcome::Existing(stored)) => {
                existing += 1;
                println!("[{}/{}] exists {} ({})", item, args.count, stored.story.story_id, stored.page_id);
            }
            Ok(CollectOutcome::Duplicate(stored)) => {
                duplicates += 1;
                println!("[{}/{}] duplicate of {} ({})", item, args.count, stored.story.story_id, stored.page_id);
            }
            Err(e) => {
                eprintln!("[{}/{}] failed: {}", item, args.count, e);
                failed.push(item);
            }
        }
    }

    println!(
        "\nSummary: {} created, {} existing, {} duplicate, {} failed",
        created,
        existing,
        duplicates,
        failed.len()
    );

    if failed.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}
