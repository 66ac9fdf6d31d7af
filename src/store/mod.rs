//! External story store: the collaborator that durably holds story records.
//!
//! The collector needs `check_story_exists` and `create_story`, plus
//! `find_duplicate` when deduplication is on. `update_story` and
//! `delete_story` complete the contract for tools that maintain an
//! existing collection.

pub mod memory;
pub mod notion;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::fingerprint::StoryFingerprint;
use crate::schema::story::{Story, StoryIdentity};

/// Missing or unusable store configuration. Raised when the store is
/// constructed, before any collection call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid store response: {0}")]
    InvalidResponse(String),
    #[error("page not found: {0}")]
    NotFound(String),
}

/// A story as held by the store, with the store's page id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStory {
    pub page_id: String,
    pub story: Story,
}

/// Result of an existence lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExistenceCheck {
    pub exists: bool,
    pub story: Option<StoredStory>,
}

impl ExistenceCheck {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn found(story: StoredStory) -> Self {
        Self {
            exists: true,
            story: Some(story),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Look a story up by id or title.
    async fn check_story_exists(
        &self,
        identity: &StoryIdentity,
    ) -> Result<ExistenceCheck, StoreError>;

    /// A stored story that `fingerprint` matches at `threshold`, if any.
    async fn find_duplicate(
        &self,
        fingerprint: &StoryFingerprint,
        threshold: f64,
    ) -> Result<Option<StoredStory>, StoreError>;

    /// Persist a new story with its Markdown rendering. `Ok(None)` means
    /// the store accepted the call but returned no usable record.
    async fn create_story(
        &self,
        story: &Story,
        markdown: &str,
    ) -> Result<Option<StoredStory>, StoreError>;

    /// Replace the fields and body of an existing page.
    async fn update_story(
        &self,
        page_id: &str,
        story: &Story,
        markdown: &str,
    ) -> Result<StoredStory, StoreError>;

    /// Archive a page.
    async fn delete_story(&self, page_id: &str) -> Result<(), StoreError>;
}
