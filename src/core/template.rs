/// Template renderer: narrative skeletons, slot parsing and rendering.
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),
    #[error("unknown slot '{{{0}}}': expected {{character}} or {{setting}}")]
    UnknownSlot(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("no template registered for story type: {0}")]
    UnsupportedType(String),
    #[error("template '{story_type}' has no {field}")]
    EmptyVocabulary {
        story_type: String,
        field: &'static str,
    },
}

/// Builtin templates shipped with the crate.
const BUILTIN_TEMPLATES: &str = include_str!("../../locale_data/templates.ron");

/// A placeholder filled at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Character,
    Setting,
}

/// A segment of a parsed skeleton line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// `{character}` or `{setting}`.
    Slot(Slot),
}

/// A parsed skeleton line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
}

impl Template {
    /// Parse a skeleton line into segments.
    ///
    /// Syntax:
    /// - `{character}` / `{setting}` → `Slot`
    /// - `{{` / `}}` → literal braces
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            match chars[i] {
                '{' if i + 1 < len && chars[i + 1] == '{' => {
                    literal_buf.push('{');
                    i += 2;
                }
                '{' => {
                    if !literal_buf.is_empty() {
                        segments.push(TemplateSegment::Literal(std::mem::take(&mut literal_buf)));
                    }

                    let start = i + 1;
                    let mut end = start;
                    while end < len && chars[end] != '}' {
                        if chars[end] == '{' {
                            return Err(TemplateError::Parse(
                                "nested braces are not allowed".to_string(),
                            ));
                        }
                        end += 1;
                    }
                    if end == len {
                        return Err(TemplateError::Parse("unclosed brace".to_string()));
                    }

                    let content: String = chars[start..end].iter().collect();
                    segments.push(TemplateSegment::Slot(Self::parse_slot(&content)?));
                    i = end + 1;
                }
                '}' if i + 1 < len && chars[i + 1] == '}' => {
                    literal_buf.push('}');
                    i += 2;
                }
                '}' => {
                    return Err(TemplateError::Parse(
                        "unmatched closing brace".to_string(),
                    ));
                }
                c => {
                    literal_buf.push(c);
                    i += 1;
                }
            }
        }

        if !literal_buf.is_empty() {
            segments.push(TemplateSegment::Literal(literal_buf));
        }

        Ok(Template { segments })
    }

    fn parse_slot(content: &str) -> Result<Slot, TemplateError> {
        match content {
            "character" => Ok(Slot::Character),
            "setting" => Ok(Slot::Setting),
            "" => Err(TemplateError::Parse("empty braces".to_string())),
            other => Err(TemplateError::UnknownSlot(other.to_string())),
        }
    }

    /// Fill every slot and return the finished line.
    pub fn fill(&self, character: &str, setting: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Slot(Slot::Character) => out.push_str(character),
                TemplateSegment::Slot(Slot::Setting) => out.push_str(setting),
            }
        }
        out
    }

    pub fn uses(&self, slot: Slot) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, TemplateSegment::Slot(found) if *found == slot))
    }
}

/// Skeleton and vocabulary for one story type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryTemplate {
    pub story_type: String,
    pub structure: Vec<Template>,
    pub characters: Vec<String>,
    pub settings: Vec<String>,
}

/// Story complexity parameters for an age group.
///
/// Computed for every render and returned with the content. The skeleton
/// text does not depend on it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Complexity {
    pub sentence_length: u32,
    pub vocabulary_level: &'static str,
    pub plot_complexity: &'static str,
}

impl Complexity {
    pub const SIMPLE: Complexity = Complexity {
        sentence_length: 5,
        vocabulary_level: "simple",
        plot_complexity: "basic",
    };
    pub const MEDIUM: Complexity = Complexity {
        sentence_length: 8,
        vocabulary_level: "medium",
        plot_complexity: "moderate",
    };
    pub const ADVANCED: Complexity = Complexity {
        sentence_length: 12,
        vocabulary_level: "advanced",
        plot_complexity: "complex",
    };
}

/// Map an age-group label to complexity parameters by exact match,
/// defaulting to the medium preset.
pub fn complexity_for(age_group: &str) -> Complexity {
    match age_group {
        "3-4" | "3-4岁" => Complexity::SIMPLE,
        "4-5" | "4-5岁" => Complexity::MEDIUM,
        "5-6" | "5-6岁" => Complexity::ADVANCED,
        _ => Complexity::MEDIUM,
    }
}

/// Output of one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStory {
    pub content: String,
    pub character: String,
    pub setting: String,
    pub complexity: Complexity,
}

/// All registered story templates, keyed by story type.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoryTemplates {
    pub templates: HashMap<String, StoryTemplate>,
}

// RON shape of one template; skeleton lines are plain strings on disk.
#[derive(Debug, Deserialize)]
struct RonTemplate {
    structure: Vec<String>,
    characters: Vec<String>,
    #[serde(default)]
    settings: Vec<String>,
}

impl StoryTemplates {
    /// The templates bundled with the crate.
    pub fn builtin() -> Result<StoryTemplates, TemplateError> {
        Self::parse_ron(BUILTIN_TEMPLATES)
    }

    /// Load templates from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<StoryTemplates, TemplateError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse templates from a RON string.
    pub fn parse_ron(input: &str) -> Result<StoryTemplates, TemplateError> {
        let raw: HashMap<String, RonTemplate> = ron::from_str(input)?;
        let mut templates = HashMap::new();

        for (story_type, ron_template) in raw {
            let structure = ron_template
                .structure
                .iter()
                .map(|line| Template::parse(line))
                .collect::<Result<Vec<_>, _>>()?;

            if structure.is_empty() {
                return Err(TemplateError::EmptyVocabulary {
                    story_type,
                    field: "structure",
                });
            }
            if ron_template.characters.is_empty() {
                return Err(TemplateError::EmptyVocabulary {
                    story_type,
                    field: "characters",
                });
            }
            if ron_template.settings.is_empty() && structure.iter().any(|t| t.uses(Slot::Setting)) {
                return Err(TemplateError::EmptyVocabulary {
                    story_type,
                    field: "settings",
                });
            }

            templates.insert(
                story_type.clone(),
                StoryTemplate {
                    story_type,
                    structure,
                    characters: ron_template.characters,
                    settings: ron_template.settings,
                },
            );
        }

        Ok(StoryTemplates { templates })
    }

    /// Merge another template set into this one. Templates from `other`
    /// replace templates in `self` with the same story type.
    pub fn merge(&mut self, other: StoryTemplates) {
        self.templates.extend(other.templates);
    }

    pub fn supports(&self, story_type: &str) -> bool {
        self.templates.contains_key(story_type)
    }

    /// Render the skeleton for `story_type` with one character and one
    /// setting drawn uniformly from its vocabulary. Lines are joined by a
    /// blank line.
    pub fn render<R: Rng + ?Sized>(
        &self,
        story_type: &str,
        age_group: &str,
        rng: &mut R,
    ) -> Result<RenderedStory, TemplateError> {
        let template = self
            .templates
            .get(story_type)
            .ok_or_else(|| TemplateError::UnsupportedType(story_type.to_string()))?;

        let complexity = complexity_for(age_group);
        let character = template
            .characters
            .choose(rng)
            .cloned()
            .ok_or_else(|| TemplateError::EmptyVocabulary {
                story_type: story_type.to_string(),
                field: "characters",
            })?;
        let setting = template.settings.choose(rng).cloned().unwrap_or_default();

        let content = template
            .structure
            .iter()
            .map(|line| line.fill(&character, &setting))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(RenderedStory {
            content,
            character,
            setting,
            complexity,
        })
    }
}
