/// Profile linter: checks language profiles and story templates.
///
/// Usage: profile_linter [profile_dir] [--templates <file>]
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;

use story_collector::core::profiles::ProfileRegistry;
use story_collector::core::registry::{RegionLocation, Regions};
use story_collector::core::template::StoryTemplates;
use story_collector::core::validator::{self, ValidationKind};
use story_collector::schema::profile::LanguageProfile;
use story_collector::schema::request::StoryRequest;

#[derive(Parser, Debug)]
#[command(name = "profile_linter", version, about = "Check language profiles and story templates")]
struct Args {
    /// Directory of profile RON files. Defaults to the bundled profiles.
    profile_dir: Option<PathBuf>,

    /// Extra templates merged over the bundled ones.
    #[arg(long)]
    templates: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let mut errors = Vec::new();

    let mut templates = match StoryTemplates::builtin() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("ERROR: bundled templates failed to load: {}", e);
            process::exit(1);
        }
    };
    if let Some(path) = &args.templates {
        match StoryTemplates::load_from_ron(path) {
            Ok(extra) => templates.merge(extra),
            Err(e) => errors.push(format!("{}: {}", path.display(), e)),
        }
    }
    println!("Loaded {} story templates", templates.templates.len());

    let registry = match &args.profile_dir {
        Some(dir) => load_profiles(dir, &mut errors),
        None => match ProfileRegistry::builtin() {
            Ok(registry) => registry,
            Err(e) => {
                eprintln!("ERROR: bundled profiles failed to load: {}", e);
                process::exit(1);
            }
        },
    };
    println!("Loaded {} language profiles", registry.len());

    let mut warnings = Vec::new();
    for profile in registry.profiles() {
        lint_profile(profile, &templates, &mut errors, &mut warnings);
    }

    println!("\n=== Profile Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if !errors.is_empty() {
        process::exit(1);
    }
}

// Loads file by file so one broken profile does not hide the others.
fn load_profiles(dir: &Path, errors: &mut Vec<String>) -> ProfileRegistry {
    let mut registry = ProfileRegistry::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            errors.push(format!("{}: {}", dir.display(), e));
            return registry;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("ron"))
        .collect();
    paths.sort();

    for path in paths {
        let loaded = LanguageProfile::load_from_ron(&path).and_then(|p| registry.register(p));
        match loaded {
            Ok(()) => println!("  Loaded: {}", path.display()),
            Err(e) => errors.push(format!("{}: {}", path.display(), e)),
        }
    }
    registry
}

fn lint_profile(
    profile: &LanguageProfile,
    templates: &StoryTemplates,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let code = &profile.language_code;

    if profile.regions.cities().is_empty() {
        errors.push(format!("{}: no regions listed", code));
    }

    if profile.story_types.restricted {
        for story_type in profile.story_types.labels.keys() {
            if !templates.supports(story_type) {
                errors.push(format!(
                    "{}: story type '{}' is accepted but has no template",
                    code, story_type
                ));
            }
        }
    } else {
        warnings.push(format!(
            "{}: story types are open; only {} templated types can be rendered",
            code,
            templates.templates.len()
        ));
    }

    if profile.cultural_sources.is_none() {
        warnings.push(format!("{}: cultural sources are not restricted", code));
    }
    if profile.allowed_themes.is_none() {
        warnings.push(format!("{}: educational themes are not restricted", code));
    }

    lint_defaults(profile, errors, warnings);
}

/// Validate the profile defaults in one city of every country.
fn lint_defaults(profile: &LanguageProfile, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let code = &profile.language_code;
    let story_type = profile
        .story_types
        .labels
        .keys()
        .next()
        .map(String::as_str)
        .unwrap_or("fairy_tale");

    let sample_cities: Vec<String> = match &profile.regions {
        Regions::Flat(cities) => cities.iter().take(1).cloned().collect(),
        Regions::ByCountry(countries) => countries
            .values()
            .filter_map(|cities| cities.first().cloned())
            .collect(),
    };

    for city in sample_cities {
        let request = StoryRequest::with_defaults(story_type, &city, &profile.defaults);
        match validator::validate(&request, profile) {
            Ok(_) => {}
            Err(e) if e.kind() == ValidationKind::UnsupportedCulturalSource => {
                let place = match profile.regions.locate(&city) {
                    Ok(RegionLocation::Country(country)) => country.to_string(),
                    _ => city.clone(),
                };
                warnings.push(format!(
                    "{}: default cultural source '{}' is not allowed in {}",
                    code, profile.defaults.cultural_source, place
                ));
            }
            Err(e) => errors.push(format!("{}: defaults rejected in {}: {}", code, city, e)),
        }
    }
}
