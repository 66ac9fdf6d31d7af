//! Notion database adapter.
//!
//! Each story is one database page. The structured fields become page
//! properties and the Markdown rendering becomes the page body, split into
//! paragraph blocks that respect Notion's rich-text length limit.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{ConfigError, ExistenceCheck, StoreError, StoredStory, StoryStore};
use crate::core::fingerprint::StoryFingerprint;
use crate::schema::request::StoryRequest;
use crate::schema::story::{Story, StoryIdentity};

pub const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Maximum characters in one rich-text object.
pub const RICH_TEXT_LIMIT: usize = 2000;
/// Maximum blocks in one children request.
pub const BLOCK_BATCH_LIMIT: usize = 100;
/// Most recent pages compared when looking for a duplicate.
pub const DUPLICATE_SCAN_LIMIT: usize = 100;

/// Credentials and endpoint for one Notion database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotionConfig {
    pub api_key: String,
    pub database_id: String,
    pub base_url: String,
    pub notion_version: String,
}

impl NotionConfig {
    pub fn new(api_key: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            database_id: database_id.into(),
            base_url: DEFAULT_NOTION_BASE_URL.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Read the configuration from the process environment, after loading
    /// a `.env` file if one is present.
    ///
    /// `NOTION_API_KEY` and `NOTION_DATABASE_ID` are required.
    /// `NOTION_BASE_URL` and `NOTION_VERSION` override the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = get("NOTION_API_KEY").ok_or(ConfigError::MissingVar("NOTION_API_KEY"))?;
        let database_id =
            get("NOTION_DATABASE_ID").ok_or(ConfigError::MissingVar("NOTION_DATABASE_ID"))?;

        let mut config = Self::new(api_key, database_id);
        if let Some(base_url) = get("NOTION_BASE_URL") {
            config = config.with_base_url(&base_url);
        }
        if let Some(version) = get("NOTION_VERSION") {
            config.notion_version = version;
        }
        Ok(config)
    }
}

/// Story store backed by a Notion database.
#[derive(Clone)]
pub struct NotionStore {
    client: Client,
    config: NotionConfig,
}

#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    #[serde(default)]
    code: String,
    message: String,
}

impl NotionStore {
    pub fn new(config: NotionConfig) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &NotionConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let response = request
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.notion_version)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            let message = match serde_json::from_str::<NotionErrorBody>(&text) {
                Ok(body) if !body.code.is_empty() => format!("{}: {}", body.code, body.message),
                Ok(body) => body.message,
                Err(_) => text,
            };
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    async fn append_blocks(&self, block_id: &str, blocks: &[Value]) -> Result<(), StoreError> {
        for batch in blocks.chunks(BLOCK_BATCH_LIMIT) {
            self.send(
                self.client
                    .patch(self.url(&format!("blocks/{block_id}/children")))
                    .json(&json!({ "children": batch })),
            )
            .await?;
        }
        Ok(())
    }

    async fn clear_blocks(&self, block_id: &str) -> Result<(), StoreError> {
        let mut cursor: Option<String> = None;
        let mut ids = Vec::new();
        loop {
            let mut request = self
                .client
                .get(self.url(&format!("blocks/{block_id}/children")))
                .query(&[("page_size", "100")]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("start_cursor", cursor.as_str())]);
            }
            let page = self.send(request).await?;
            let results = page["results"].as_array().ok_or_else(|| {
                StoreError::InvalidResponse("block list has no results".to_string())
            })?;
            ids.extend(
                results
                    .iter()
                    .filter_map(|block| block["id"].as_str().map(str::to_string)),
            );
            cursor = page["next_cursor"].as_str().map(str::to_string);
            if !page["has_more"].as_bool().unwrap_or(false) || cursor.is_none() {
                break;
            }
        }
        for id in ids {
            self.send(self.client.delete(self.url(&format!("blocks/{id}"))))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StoryStore for NotionStore {
    async fn check_story_exists(
        &self,
        identity: &StoryIdentity,
    ) -> Result<ExistenceCheck, StoreError> {
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("databases/{}/query", self.config.database_id)))
                    .json(&existence_query(identity)),
            )
            .await?;

        let first = response["results"]
            .as_array()
            .ok_or_else(|| StoreError::InvalidResponse("query has no results".to_string()))?
            .first();

        match first {
            Some(page) => {
                let stored = stored_from_page(page)?;
                tracing::debug!(page_id = %stored.page_id, story_id = %identity.story_id, "found existing page");
                Ok(ExistenceCheck::found(stored))
            }
            None => Ok(ExistenceCheck::missing()),
        }
    }

    async fn find_duplicate(
        &self,
        fingerprint: &StoryFingerprint,
        threshold: f64,
    ) -> Result<Option<StoredStory>, StoreError> {
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("databases/{}/query", self.config.database_id)))
                    .json(&duplicate_query(fingerprint)),
            )
            .await?;

        let pages = response["results"]
            .as_array()
            .ok_or_else(|| StoreError::InvalidResponse("query has no results".to_string()))?;
        let duplicate = first_duplicate(pages, fingerprint, threshold)?;
        if let Some(stored) = &duplicate {
            tracing::debug!(
                page_id = %stored.page_id,
                fingerprint = %fingerprint.short(),
                candidates = pages.len(),
                "found duplicate page"
            );
        }
        Ok(duplicate)
    }

    async fn create_story(
        &self,
        story: &Story,
        markdown: &str,
    ) -> Result<Option<StoredStory>, StoreError> {
        let blocks = markdown_blocks(markdown);
        let (first, rest) = blocks.split_at(blocks.len().min(BLOCK_BATCH_LIMIT));

        let response = self
            .send(self.client.post(self.url("pages")).json(&json!({
                "parent": { "database_id": self.config.database_id },
                "properties": story_properties(story),
                "children": first,
            })))
            .await?;

        let Some(page_id) = response["id"].as_str() else {
            tracing::warn!(story_id = %story.story_id, "page create returned no id");
            return Ok(None);
        };
        if !rest.is_empty() {
            self.append_blocks(page_id, rest).await?;
        }
        tracing::info!(page_id, story_id = %story.story_id, blocks = blocks.len(), "created Notion page");

        Ok(Some(StoredStory {
            page_id: page_id.to_string(),
            story: story.clone(),
        }))
    }

    async fn update_story(
        &self,
        page_id: &str,
        story: &Story,
        markdown: &str,
    ) -> Result<StoredStory, StoreError> {
        self.send(
            self.client
                .patch(self.url(&format!("pages/{page_id}")))
                .json(&json!({ "properties": story_properties(story) })),
        )
        .await?;
        self.clear_blocks(page_id).await?;
        self.append_blocks(page_id, &markdown_blocks(markdown)).await?;
        tracing::info!(page_id, story_id = %story.story_id, "updated Notion page");

        Ok(StoredStory {
            page_id: page_id.to_string(),
            story: story.clone(),
        })
    }

    async fn delete_story(&self, page_id: &str) -> Result<(), StoreError> {
        self.send(
            self.client
                .patch(self.url(&format!("pages/{page_id}")))
                .json(&json!({ "archived": true })),
        )
        .await?;
        tracing::info!(page_id, "archived Notion page");
        Ok(())
    }
}

// --- Wire mapping ---

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

/// Database properties for `story`. `Content` holds the raw story text cut
/// to the rich-text limit; the full Markdown lives in the page body.
pub fn story_properties(story: &Story) -> Value {
    let request = &story.request;
    json!({
        "Title": { "title": rich_text(&story.title) },
        "StoryId": { "rich_text": rich_text(&story.story_id) },
        "Language": { "select": { "name": story.language } },
        "Type": { "select": { "name": request.story_type } },
        "Region": { "rich_text": rich_text(&request.region) },
        "AgeGroup": { "select": { "name": request.age_group } },
        "EducationalThemes": {
            "multi_select": request
                .educational_themes
                .iter()
                .map(|theme| json!({ "name": theme }))
                .collect::<Vec<_>>()
        },
        "Length": { "select": { "name": request.length } },
        "CulturalSource": { "rich_text": rich_text(&request.cultural_source) },
        "Content": { "rich_text": rich_text(&truncate_chars(&story.content, RICH_TEXT_LIMIT)) },
        "CreatedAt": { "date": { "start": story.created_at } },
    })
}

/// Query body matching a page by story id or title.
pub fn existence_query(identity: &StoryIdentity) -> Value {
    json!({
        "filter": {
            "or": [
                { "property": "StoryId", "rich_text": { "equals": identity.story_id } },
                { "property": "Title", "title": { "equals": identity.title } },
            ]
        },
        "page_size": 1,
    })
}

/// Query body for duplicate candidates: the newest pages sharing the
/// fingerprint's language, type and region.
pub fn duplicate_query(fingerprint: &StoryFingerprint) -> Value {
    json!({
        "filter": {
            "and": [
                { "property": "Language", "select": { "equals": fingerprint.language } },
                { "property": "Type", "select": { "equals": fingerprint.story_type } },
                { "property": "Region", "rich_text": { "equals": fingerprint.region } },
            ]
        },
        "sorts": [{ "timestamp": "created_time", "direction": "descending" }],
        "page_size": DUPLICATE_SCAN_LIMIT,
    })
}

/// The first page in `pages` whose story `fingerprint` matches.
///
/// Page content comes from the `Content` property, so stories longer than
/// the rich-text limit are compared on their opening only.
pub fn first_duplicate(
    pages: &[Value],
    fingerprint: &StoryFingerprint,
    threshold: f64,
) -> Result<Option<StoredStory>, StoreError> {
    for page in pages {
        let stored = stored_from_page(page)?;
        if StoryFingerprint::of(&stored.story).matches(fingerprint, threshold) {
            return Ok(Some(stored));
        }
    }
    Ok(None)
}

/// Paragraph blocks carrying `markdown`, one per chunk.
pub fn markdown_blocks(markdown: &str) -> Vec<Value> {
    chunk_chars(markdown, RICH_TEXT_LIMIT)
        .into_iter()
        .map(|chunk| {
            json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": { "rich_text": rich_text(chunk) },
            })
        })
        .collect()
}

/// Split `text` into pieces of at most `limit` characters.
pub fn chunk_chars(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn plain_text(value: &Value) -> String {
    value
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| {
                    part["plain_text"]
                        .as_str()
                        .or_else(|| part["text"]["content"].as_str())
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Rebuild a stored story from a Notion page object.
///
/// `content` comes back from the `Content` property and so is cut to the
/// rich-text limit.
pub fn stored_from_page(page: &Value) -> Result<StoredStory, StoreError> {
    let page_id = page["id"]
        .as_str()
        .ok_or_else(|| StoreError::InvalidResponse("page has no id".to_string()))?;
    let props = &page["properties"];
    if !props.is_object() {
        return Err(StoreError::InvalidResponse(format!(
            "page {page_id} has no properties"
        )));
    }

    let text = |name: &str| plain_text(&props[name]["rich_text"]);
    let select = |name: &str| props[name]["select"]["name"].as_str().unwrap_or_default().to_string();

    let story = Story {
        language: select("Language"),
        request: StoryRequest {
            story_type: select("Type"),
            region: text("Region"),
            age_group: select("AgeGroup"),
            educational_themes: props["EducationalThemes"]["multi_select"]
                .as_array()
                .map(|options| {
                    options
                        .iter()
                        .filter_map(|option| option["name"].as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            length: select("Length"),
            cultural_source: text("CulturalSource"),
        },
        story_id: text("StoryId"),
        title: plain_text(&props["Title"]["title"]),
        content: text("Content"),
        created_at: props["CreatedAt"]["date"]["start"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    };

    Ok(StoredStory {
        page_id: page_id.to_string(),
        story,
    })
}
