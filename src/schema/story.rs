use serde::{Deserialize, Serialize};

use super::request::StoryRequest;

/// The identity of one story: its id and display title.
///
/// Built once per collection call and reused for the existence check,
/// the generated record, and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryIdentity {
    pub story_id: String,
    pub title: String,
}

/// A generated story record: the request fields plus identity, rendered
/// content and creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub language: String,
    #[serde(flatten)]
    pub request: StoryRequest,
    pub story_id: String,
    pub title: String,
    pub content: String,
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub created_at: String,
}

impl Story {
    pub fn identity(&self) -> StoryIdentity {
        StoryIdentity {
            story_id: self.story_id.clone(),
            title: self.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_flat_record() {
        let story = Story {
            language: "EN".to_string(),
            request: StoryRequest {
                story_type: "myth".to_string(),
                region: "London".to_string(),
                age_group: "5-6".to_string(),
                educational_themes: vec!["courage".to_string()],
                length: "short".to_string(),
                cultural_source: "British".to_string(),
            },
            story_id: "EN_LONDON_MYTH_1".to_string(),
            title: "London_myth_EN_LONDON_MYTH_1".to_string(),
            content: "In the beginning...".to_string(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        };
        let value = serde_json::to_value(&story).unwrap();
        assert_eq!(value["type"], "myth");
        assert_eq!(value["story_id"], "EN_LONDON_MYTH_1");

        let back: Story = serde_json::from_value(value).unwrap();
        assert_eq!(back.identity().title, story.title);
    }
}
