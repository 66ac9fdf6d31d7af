use serde::{Deserialize, Serialize};

use super::profile::RequestDefaults;

/// Structured parameters for one story.
///
/// Field names follow the external record layout (`type`, `age_group`, ...)
/// so requests can be read from JSON as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRequest {
    #[serde(rename = "type")]
    pub story_type: String,
    pub region: String,
    pub age_group: String,
    pub educational_themes: Vec<String>,
    pub length: String,
    pub cultural_source: String,
}

impl StoryRequest {
    /// Build a request for `story_type` in `region`, taking every other
    /// field from the profile defaults.
    pub fn with_defaults(story_type: &str, region: &str, defaults: &RequestDefaults) -> Self {
        Self {
            story_type: story_type.to_string(),
            region: region.to_string(),
            age_group: defaults.age_group.clone(),
            educational_themes: defaults.educational_themes.clone(),
            length: defaults.length.clone(),
            cultural_source: defaults.cultural_source.clone(),
        }
    }
}
