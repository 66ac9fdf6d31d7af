/// The collection pipeline: request → validated identity → existence
/// check → rendered story → duplicate check → Markdown → store.
///
/// One `StoryCollector` serves one language profile. Calls run one at a
/// time; the only suspension points are the store calls. The duplicate
/// check runs only when the collector was built with a threshold.
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

use crate::core::clock::{Clock, SystemClock};
use crate::core::fingerprint::StoryFingerprint;
use crate::core::identity;
use crate::core::markdown;
use crate::core::registry::{RegionLocation, RegistryError};
use crate::core::template::{StoryTemplates, TemplateError};
use crate::core::validator::{self, ValidationError};
use crate::schema::profile::{LanguageProfile, ProfileError};
use crate::schema::request::StoryRequest;
use crate::schema::story::Story;
use crate::store::{StoreError, StoredStory, StoryStore};

/// Stages of one collection call, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectStage {
    Validating,
    CheckingExistence,
    Generating,
    CheckingDuplicates,
    Formatting,
    Persisting,
}

impl CollectStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::CheckingExistence => "checking_existence",
            Self::Generating => "generating",
            Self::CheckingDuplicates => "checking_duplicates",
            Self::Formatting => "formatting",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for CollectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("validation failed: {0}")]
    Validation(ValidationError),
    /// A region passed the membership check but could not be located.
    #[error("region registry inconsistent: {0}")]
    Registry(RegistryError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("store returned no record for story {story_id}")]
    PersistenceFailed { story_id: String },
    #[error("store error while {stage}: {source}")]
    Collaborator {
        stage: CollectStage,
        source: StoreError,
    },
}

impl From<ValidationError> for CollectError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Registry(inner) => Self::Registry(inner),
            other => Self::Validation(other),
        }
    }
}

impl CollectError {
    /// The stage the call was in when it failed.
    pub fn stage(&self) -> CollectStage {
        match self {
            Self::Validation(_) | Self::Registry(_) => CollectStage::Validating,
            Self::Template(_) => CollectStage::Generating,
            Self::PersistenceFailed { .. } => CollectStage::Persisting,
            Self::Collaborator { stage, .. } => *stage,
        }
    }

    /// True for defects in the request itself, as opposed to failures of
    /// the store or of the crate's own data.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("collector needs a language profile")]
    MissingProfile,
    #[error("collector needs a story store")]
    MissingStore,
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("similarity threshold must be within 0..=1, got {0}")]
    InvalidThreshold(f64),
}

/// What a successful collection call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// The store already held this story; nothing was generated.
    Existing(StoredStory),
    /// A new story was generated and persisted.
    Created { stored: StoredStory, markdown: String },
    /// The generated story matched a stored one and was dropped.
    Duplicate(StoredStory),
}

impl CollectOutcome {
    pub fn stored(&self) -> &StoredStory {
        match self {
            Self::Existing(stored) | Self::Created { stored, .. } | Self::Duplicate(stored) => {
                stored
            }
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Runs collection calls for one language profile. Built via
/// `StoryCollector::builder()`.
pub struct StoryCollector {
    profile: LanguageProfile,
    templates: StoryTemplates,
    store: Arc<dyn StoryStore>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    dedup_threshold: Option<f64>,
}

/// Builder for constructing a `StoryCollector`.
#[derive(Default)]
pub struct StoryCollectorBuilder {
    profile: Option<LanguageProfile>,
    templates: Option<StoryTemplates>,
    store: Option<Arc<dyn StoryStore>>,
    clock: Option<Arc<dyn Clock>>,
    seed: Option<u64>,
    dedup_threshold: Option<f64>,
}

impl StoryCollector {
    pub fn builder() -> StoryCollectorBuilder {
        StoryCollectorBuilder::default()
    }

    pub fn profile(&self) -> &LanguageProfile {
        &self.profile
    }

    pub fn dedup_threshold(&self) -> Option<f64> {
        self.dedup_threshold
    }

    /// Validate `request` without touching the store.
    pub fn validate(&self, request: &StoryRequest) -> Result<RegionLocation, CollectError> {
        Ok(validator::validate(request, &self.profile)?)
    }

    /// Everything a batch can check before its first store call: the
    /// request validates and a template renders its story type.
    pub fn preflight(&self, request: &StoryRequest) -> Result<RegionLocation, CollectError> {
        let location = self.validate(request)?;
        if !self.templates.supports(&request.story_type) {
            return Err(TemplateError::UnsupportedType(request.story_type.clone()).into());
        }
        Ok(location)
    }

    /// Collect one story.
    ///
    /// Returns the stored record when the store already holds a story with
    /// the same id or title. Every failure is logged once here and
    /// returned; the caller decides whether to continue.
    pub async fn collect(&mut self, request: &StoryRequest) -> Result<CollectOutcome, CollectError> {
        let span = tracing::info_span!(
            "collect_story",
            language = %self.profile.language_code,
            region = %request.region,
            story_type = %request.story_type,
        );
        let result = self.run(request).instrument(span.clone()).await;

        if let Err(err) = &result {
            let _enter = span.enter();
            let strings = &self.profile.strings;
            match err {
                CollectError::PersistenceFailed { story_id } => {
                    tracing::error!(%story_id, "{}", strings.save_failed);
                }
                err if err.is_input_error() => {
                    tracing::warn!(stage = %err.stage(), error = %err, "{}", strings.collect_failed);
                }
                err => {
                    tracing::error!(stage = %err.stage(), error = %err, "{}", strings.collect_failed);
                }
            }
        }
        result
    }

    async fn run(&mut self, request: &StoryRequest) -> Result<CollectOutcome, CollectError> {
        tracing::info!(stage = %CollectStage::Validating, "{}", self.profile.strings.collect_started);
        let location = validator::validate(request, &self.profile)?;

        // Identity is fixed here and reused for every later stage.
        let at = self.clock.now();
        let identity = identity::build(&self.profile, request, &location, at);
        tracing::debug!(story_id = %identity.story_id, title = %identity.title, "story identity");

        let existing = self
            .store
            .check_story_exists(&identity)
            .await
            .map_err(|source| CollectError::Collaborator {
                stage: CollectStage::CheckingExistence,
                source,
            })?;
        if existing.exists {
            let stored = existing.story.ok_or_else(|| CollectError::Collaborator {
                stage: CollectStage::CheckingExistence,
                source: StoreError::InvalidResponse(format!(
                    "store reported {} as existing without a record",
                    identity.story_id
                )),
            })?;
            tracing::info!(
                story_id = %stored.story.story_id,
                page_id = %stored.page_id,
                "{}",
                self.profile.strings.already_exists
            );
            return Ok(CollectOutcome::Existing(stored));
        }

        let rendered = self
            .templates
            .render(&request.story_type, &request.age_group, &mut self.rng)?;
        tracing::debug!(
            stage = %CollectStage::Generating,
            character = %rendered.character,
            setting = %rendered.setting,
            sentence_length = rendered.complexity.sentence_length,
            vocabulary_level = rendered.complexity.vocabulary_level,
            plot_complexity = rendered.complexity.plot_complexity,
            "rendered story"
        );

        let story = Story {
            language: self.profile.language_code.to_uppercase(),
            request: request.clone(),
            story_id: identity.story_id,
            title: identity.title,
            content: rendered.content,
            created_at: identity::created_at(at),
        };

        if let Some(threshold) = self.dedup_threshold {
            let fingerprint = StoryFingerprint::of(&story);
            let duplicate = self
                .store
                .find_duplicate(&fingerprint, threshold)
                .await
                .map_err(|source| CollectError::Collaborator {
                    stage: CollectStage::CheckingDuplicates,
                    source,
                })?;
            if let Some(stored) = duplicate {
                tracing::info!(
                    story_id = %story.story_id,
                    duplicate_of = %stored.story.story_id,
                    page_id = %stored.page_id,
                    fingerprint = %fingerprint.short(),
                    "{}",
                    self.profile.strings.already_exists
                );
                return Ok(CollectOutcome::Duplicate(stored));
            }
        }

        let markdown = markdown::format(&story, &self.profile);
        tracing::debug!(stage = %CollectStage::Formatting, bytes = markdown.len(), "formatted story");

        let created = self
            .store
            .create_story(&story, &markdown)
            .await
            .map_err(|source| CollectError::Collaborator {
                stage: CollectStage::Persisting,
                source,
            })?;
        let Some(stored) = created else {
            return Err(CollectError::PersistenceFailed {
                story_id: story.story_id,
            });
        };
        tracing::info!(
            story_id = %stored.story.story_id,
            page_id = %stored.page_id,
            "{}",
            self.profile.strings.saved
        );

        Ok(CollectOutcome::Created { stored, markdown })
    }
}

impl StoryCollectorBuilder {
    pub fn profile(mut self, profile: LanguageProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Templates to render with. Defaults to the builtin set.
    pub fn templates(mut self, templates: StoryTemplates) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn store(mut self, store: Arc<dyn StoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Time source for ids and timestamps. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Seed the character and setting picks. Unseeded collectors draw
    /// from entropy.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Drop generated stories that match a stored story of the same
    /// language, region and type at `threshold` similarity. Off by default.
    pub fn dedup(mut self, threshold: f64) -> Self {
        self.dedup_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> Result<StoryCollector, BuildError> {
        if let Some(threshold) = self.dedup_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(BuildError::InvalidThreshold(threshold));
            }
        }
        let profile = self.profile.ok_or(BuildError::MissingProfile)?;
        profile.check()?;
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let templates = match self.templates {
            Some(templates) => templates,
            None => StoryTemplates::builtin()?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(StoryCollector {
            profile,
            templates,
            store,
            clock,
            rng,
            dedup_threshold: self.dedup_threshold,
        })
    }
}
