/// In-process story store for dry runs and tests.
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::{ExistenceCheck, StoreError, StoredStory, StoryStore};
use crate::core::fingerprint::StoryFingerprint;
use crate::schema::story::{Story, StoryIdentity};

#[derive(Debug, Clone)]
struct Page {
    stored: StoredStory,
    markdown: String,
}

/// Keeps every story in memory, in insertion order. Deleted pages are
/// removed outright.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    pages: Mutex<Vec<Page>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored stories.
    pub async fn stories(&self) -> Vec<StoredStory> {
        self.pages
            .lock()
            .await
            .iter()
            .map(|page| page.stored.clone())
            .collect()
    }

    /// The Markdown body saved with `page_id`.
    pub async fn markdown(&self, page_id: &str) -> Option<String> {
        self.pages
            .lock()
            .await
            .iter()
            .find(|page| page.stored.page_id == page_id)
            .map(|page| page.markdown.clone())
    }

    pub async fn len(&self) -> usize {
        self.pages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pages.lock().await.is_empty()
    }

    fn allocate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("mem-{n:06}")
    }
}

#[async_trait]
impl StoryStore for InMemoryStore {
    async fn check_story_exists(
        &self,
        identity: &StoryIdentity,
    ) -> Result<ExistenceCheck, StoreError> {
        let pages = self.pages.lock().await;
        let found = pages.iter().find(|page| {
            page.stored.story.story_id == identity.story_id
                || page.stored.story.title == identity.title
        });
        Ok(match found {
            Some(page) => ExistenceCheck::found(page.stored.clone()),
            None => ExistenceCheck::missing(),
        })
    }

    async fn find_duplicate(
        &self,
        fingerprint: &StoryFingerprint,
        threshold: f64,
    ) -> Result<Option<StoredStory>, StoreError> {
        let pages = self.pages.lock().await;
        Ok(pages
            .iter()
            .find(|page| StoryFingerprint::of(&page.stored.story).matches(fingerprint, threshold))
            .map(|page| page.stored.clone()))
    }

    async fn create_story(
        &self,
        story: &Story,
        markdown: &str,
    ) -> Result<Option<StoredStory>, StoreError> {
        let stored = StoredStory {
            page_id: self.allocate_id(),
            story: story.clone(),
        };
        self.pages.lock().await.push(Page {
            stored: stored.clone(),
            markdown: markdown.to_string(),
        });
        Ok(Some(stored))
    }

    async fn update_story(
        &self,
        page_id: &str,
        story: &Story,
        markdown: &str,
    ) -> Result<StoredStory, StoreError> {
        let mut pages = self.pages.lock().await;
        let page = pages
            .iter_mut()
            .find(|page| page.stored.page_id == page_id)
            .ok_or_else(|| StoreError::NotFound(page_id.to_string()))?;
        page.stored.story = story.clone();
        page.markdown = markdown.to_string();
        Ok(page.stored.clone())
    }

    async fn delete_story(&self, page_id: &str) -> Result<(), StoreError> {
        let mut pages = self.pages.lock().await;
        let before = pages.len();
        pages.retain(|page| page.stored.page_id != page_id);
        if pages.len() == before {
            return Err(StoreError::NotFound(page_id.to_string()));
        }
        Ok(())
    }
}
