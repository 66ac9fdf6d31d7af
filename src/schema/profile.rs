/// Language profiles: the per-language data bundle driving the pipeline.
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::registry::{RegionLocation, Regions, RegistryError};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("profile has an empty language code")]
    EmptyLanguageCode,
    #[error("{language}: cultural sources are keyed by country but regions are flat")]
    CulturalSourcesWithoutCountries { language: String },
    #[error("{language}: cultural sources name unknown country '{country}'")]
    UnknownCountry { language: String, country: String },
    #[error("{language}: no cultural sources listed for country '{country}'")]
    MissingCountrySources { language: String, country: String },
    #[error("unsupported language: {0}")]
    UnknownLanguage(String),
    #[error("language '{0}' is registered twice")]
    DuplicateLanguage(String),
}

/// Story type vocabulary of a profile.
///
/// `labels` maps the internal type key to its localized display label.
/// When `restricted` is false the labels are display-only and any type
/// key passes validation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoryTypes {
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl StoryTypes {
    pub fn accepts(&self, story_type: &str) -> bool {
        !self.restricted || self.labels.contains_key(story_type)
    }

    /// Localized label for `story_type`, falling back to the raw key.
    pub fn label<'a>(&'a self, story_type: &'a str) -> &'a str {
        self.labels
            .get(story_type)
            .map(String::as_str)
            .unwrap_or(story_type)
    }
}

/// Allowed cultural sources, either one list for the whole language or
/// one list per country.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CulturalSources {
    Flat(Vec<String>),
    ByCountry(BTreeMap<String, Vec<String>>),
}

impl CulturalSources {
    pub fn allows(&self, location: &RegionLocation, source: &str) -> bool {
        match (self, location) {
            (Self::Flat(sources), _) => sources.iter().any(|s| s == source),
            (Self::ByCountry(by_country), RegionLocation::Country(country)) => by_country
                .get(country.as_str())
                .is_some_and(|sources| sources.iter().any(|s| s == source)),
            (Self::ByCountry(_), RegionLocation::Flat) => false,
        }
    }
}

/// Section headers for the Markdown rendering and the messages logged
/// while collecting, in the profile's language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizedStrings {
    pub story_info: String,
    pub id: String,
    pub story_type: String,
    pub region: String,
    pub age_group: String,
    pub themes: String,
    pub length: String,
    pub cultural_source: String,
    pub content: String,
    pub created_at: String,
    pub collect_started: String,
    pub already_exists: String,
    pub saved: String,
    pub save_failed: String,
    pub collect_failed: String,
}

/// Values used for request fields the caller leaves out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDefaults {
    pub age_group: String,
    pub educational_themes: Vec<String>,
    pub length: String,
    pub cultural_source: String,
}

/// Immutable per-language configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub language_code: String,
    pub name: String,
    pub regions: Regions,
    #[serde(default)]
    pub story_types: StoryTypes,
    #[serde(default)]
    pub cultural_sources: Option<CulturalSources>,
    #[serde(default)]
    pub allowed_themes: Option<FxHashSet<String>>,
    pub strings: LocalizedStrings,
    pub defaults: RequestDefaults,
}

impl LanguageProfile {
    /// Load and check a profile from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<LanguageProfile, ProfileError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and check a profile from a RON string.
    pub fn parse_ron(input: &str) -> Result<LanguageProfile, ProfileError> {
        let profile: LanguageProfile = ron::from_str(input)?;
        profile.check()?;
        Ok(profile)
    }

    /// Construction-time invariants: disjoint city lists, and country-keyed
    /// cultural sources that line up with the region countries.
    pub fn check(&self) -> Result<(), ProfileError> {
        if self.language_code.trim().is_empty() {
            return Err(ProfileError::EmptyLanguageCode);
        }
        self.regions.check_disjoint()?;

        if let Some(CulturalSources::ByCountry(by_country)) = &self.cultural_sources {
            let Regions::ByCountry(region_countries) = &self.regions else {
                return Err(ProfileError::CulturalSourcesWithoutCountries {
                    language: self.language_code.clone(),
                });
            };
            if let Some(country) = by_country
                .keys()
                .find(|c| !region_countries.contains_key(c.as_str()))
            {
                return Err(ProfileError::UnknownCountry {
                    language: self.language_code.clone(),
                    country: country.clone(),
                });
            }
            if let Some(country) = region_countries
                .keys()
                .find(|c| !by_country.contains_key(c.as_str()))
            {
                return Err(ProfileError::MissingCountrySources {
                    language: self.language_code.clone(),
                    country: country.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn type_label<'a>(&'a self, story_type: &'a str) -> &'a str {
        self.story_types.label(story_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::CountryId;

    const STRINGS: &str = r#"(
        story_info: "Story Information",
        id: "ID",
        story_type: "Type",
        region: "Region",
        age_group: "Age Group",
        themes: "Educational Themes",
        length: "Length",
        cultural_source: "Cultural Source",
        content: "Story Content",
        created_at: "Created At",
        collect_started: "start",
        already_exists: "exists",
        saved: "saved",
        save_failed: "failed",
        collect_failed: "collect failed",
    )"#;

    const DEFAULTS: &str = r#"(
        age_group: "3-4",
        educational_themes: ["courage"],
        length: "short",
        cultural_source: "X",
    )"#;

    fn profile_ron(regions: &str, sources: &str) -> String {
        format!(
            r#"(
                language_code: "XX",
                name: "Test",
                regions: {regions},
                cultural_sources: {sources},
                strings: {STRINGS},
                defaults: {DEFAULTS},
            )"#
        )
    }

    #[test]
    fn parse_flat_profile() {
        let ron = profile_ron(r#"Flat(["A", "B"])"#, r#"Some(Flat(["X"]))"#);
        let profile = LanguageProfile::parse_ron(&ron).unwrap();
        assert_eq!(profile.language_code, "XX");
        assert!(!profile.story_types.restricted);
        assert!(profile.allowed_themes.is_none());
        assert!(profile.regions.is_valid_region("B"));
    }

    #[test]
    fn parse_rejects_overlapping_cities() {
        let ron = profile_ron(r#"ByCountry({"a": ["City"], "b": ["City"]})"#, "None");
        let err = LanguageProfile::parse_ron(&ron).unwrap_err();
        assert!(matches!(err, ProfileError::Registry(RegistryError::OverlappingCity { .. })));
    }

    #[test]
    fn country_sources_need_country_regions() {
        let ron = profile_ron(r#"Flat(["A"])"#, r#"Some(ByCountry({"a": ["X"]}))"#);
        let err = LanguageProfile::parse_ron(&ron).unwrap_err();
        assert!(matches!(err, ProfileError::CulturalSourcesWithoutCountries { .. }));
    }

    #[test]
    fn country_sources_must_match_region_countries() {
        let ron = profile_ron(
            r#"ByCountry({"a": ["A1"]})"#,
            r#"Some(ByCountry({"a": ["X"], "z": ["Y"]}))"#,
        );
        let err = LanguageProfile::parse_ron(&ron).unwrap_err();
        assert!(matches!(err, ProfileError::UnknownCountry { ref country, .. } if country == "z"));

        let ron = profile_ron(
            r#"ByCountry({"a": ["A1"], "b": ["B1"]})"#,
            r#"Some(ByCountry({"a": ["X"]}))"#,
        );
        let err = LanguageProfile::parse_ron(&ron).unwrap_err();
        assert!(
            matches!(err, ProfileError::MissingCountrySources { ref country, .. } if country == "b")
        );
    }

    #[test]
    fn type_label_falls_back_to_key() {
        let types = StoryTypes {
            restricted: true,
            labels: BTreeMap::from([("myth".to_string(), "mito".to_string())]),
        };
        assert_eq!(types.label("myth"), "mito");
        assert_eq!(types.label("fable"), "fable");
        assert!(types.accepts("myth"));
        assert!(!types.accepts("fable"));

        let open = StoryTypes::default();
        assert!(open.accepts("anything"));
    }

    #[test]
    fn cultural_sources_per_country() {
        let sources = CulturalSources::ByCountry(BTreeMap::from([
            ("egypt".to_string(), vec!["Coptic".to_string()]),
            ("saudi".to_string(), vec!["Najdi".to_string()]),
        ]));
        let egypt = RegionLocation::Country(CountryId("egypt".to_string()));
        assert!(sources.allows(&egypt, "Coptic"));
        assert!(!sources.allows(&egypt, "Najdi"));
        assert!(!sources.allows(&RegionLocation::Flat, "Coptic"));
    }
}
