/// Request validation against a language profile.
///
/// Checks run in a fixed order and stop at the first failure:
/// required fields, region, story type, cultural source, themes.
/// Blank values count as missing, and a theme may be listed only once.
/// Which of the last three are active depends on the vocabularies the
/// profile defines.
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::core::registry::{CountryId, RegionLocation, RegistryError};
use crate::schema::profile::LanguageProfile;
use crate::schema::request::StoryRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unsupported region: {0}")]
    UnsupportedRegion(String),
    #[error("unsupported story type: {0}")]
    UnsupportedType(String),
    #[error("unsupported cultural source{}: {source_name}", .country.as_ref().map(|c| format!(" for {c}")).unwrap_or_default())]
    UnsupportedCulturalSource {
        country: Option<CountryId>,
        source_name: String,
    },
    #[error("unsupported educational themes: {}", .0.join(", "))]
    UnsupportedThemes(Vec<String>),
    #[error("educational themes listed more than once: {}", .0.join(", "))]
    DuplicateThemes(Vec<String>),
    /// A region passed the membership check but no country owns it.
    #[error("registry invariant violated: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    MissingField,
    UnsupportedRegion,
    UnsupportedType,
    UnsupportedCulturalSource,
    UnsupportedThemes,
    DuplicateThemes,
    RegionNotFound,
}

impl ValidationError {
    pub fn kind(&self) -> ValidationKind {
        match self {
            Self::MissingField(_) => ValidationKind::MissingField,
            Self::UnsupportedRegion(_) => ValidationKind::UnsupportedRegion,
            Self::UnsupportedType(_) => ValidationKind::UnsupportedType,
            Self::UnsupportedCulturalSource { .. } => ValidationKind::UnsupportedCulturalSource,
            Self::UnsupportedThemes(_) => ValidationKind::UnsupportedThemes,
            Self::DuplicateThemes(_) => ValidationKind::DuplicateThemes,
            Self::Registry(_) => ValidationKind::RegionNotFound,
        }
    }
}

/// Validate `request` against `profile`.
///
/// On success returns where the region sits in the profile's registry,
/// so later stages do not resolve it again.
pub fn validate(
    request: &StoryRequest,
    profile: &LanguageProfile,
) -> Result<RegionLocation, ValidationError> {
    check_required(request)?;

    if !profile.regions.is_valid_region(&request.region) {
        return Err(ValidationError::UnsupportedRegion(request.region.clone()));
    }
    let location = profile.regions.locate(&request.region)?;

    if !profile.story_types.accepts(&request.story_type) {
        return Err(ValidationError::UnsupportedType(request.story_type.clone()));
    }

    if let Some(sources) = &profile.cultural_sources {
        if !sources.allows(&location, &request.cultural_source) {
            let country = match &location {
                RegionLocation::Country(country) => Some(country.clone()),
                RegionLocation::Flat => None,
            };
            return Err(ValidationError::UnsupportedCulturalSource {
                country,
                source_name: request.cultural_source.clone(),
            });
        }
    }

    if let Some(allowed) = &profile.allowed_themes {
        let invalid: Vec<String> = request
            .educational_themes
            .iter()
            .filter(|theme| !allowed.contains(theme.as_str()))
            .cloned()
            .collect();
        if !invalid.is_empty() {
            return Err(ValidationError::UnsupportedThemes(invalid));
        }
    }

    Ok(location)
}

fn check_required(request: &StoryRequest) -> Result<(), ValidationError> {
    let text_fields = [
        ("type", &request.story_type),
        ("region", &request.region),
        ("age_group", &request.age_group),
    ];
    for (name, value) in text_fields {
        if is_blank(value) {
            return Err(ValidationError::MissingField(name));
        }
    }
    let themes = &request.educational_themes;
    if themes.is_empty() || themes.iter().any(|theme| is_blank(theme)) {
        return Err(ValidationError::MissingField("educational_themes"));
    }
    let duplicates = repeated_themes(themes);
    if !duplicates.is_empty() {
        return Err(ValidationError::DuplicateThemes(duplicates));
    }
    if is_blank(&request.length) {
        return Err(ValidationError::MissingField("length"));
    }
    if is_blank(&request.cultural_source) {
        return Err(ValidationError::MissingField("cultural_source"));
    }
    Ok(())
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Each label that appears more than once, reported once, in request order.
fn repeated_themes(themes: &[String]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut reported = FxHashSet::default();
    let mut repeated = Vec::new();
    for theme in themes {
        if !seen.insert(theme.as_str()) && reported.insert(theme.as_str()) {
            repeated.push(theme.clone());
        }
    }
    repeated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profiles::ProfileRegistry;

    fn jp_request() -> StoryRequest {
        StoryRequest {
            story_type: "fairy_tale".to_string(),
            region: "Tokyo".to_string(),
            age_group: "3-4".to_string(),
            educational_themes: vec!["勇気".to_string(), "知恵".to_string()],
            length: "short".to_string(),
            cultural_source: "Japanese".to_string(),
        }
    }

    #[test]
    fn valid_japanese_request() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let location = validate(&jp_request(), profiles.get("JP").unwrap()).unwrap();
        assert_eq!(location, RegionLocation::Flat);
    }

    #[test]
    fn missing_fields_in_order() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let jp = profiles.get("JP").unwrap();

        let mut request = jp_request();
        request.age_group.clear();
        request.length.clear();
        assert_eq!(
            validate(&request, jp),
            Err(ValidationError::MissingField("age_group"))
        );

        let mut request = jp_request();
        request.educational_themes.clear();
        let err = validate(&request, jp).unwrap_err();
        assert_eq!(err.kind(), ValidationKind::MissingField);
        assert_eq!(err.to_string(), "missing required field: educational_themes");
    }

    #[test]
    fn blank_values_are_missing() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let en = profiles.get("EN").unwrap();
        let mut request = StoryRequest {
            story_type: "fairy_tale".to_string(),
            region: "London".to_string(),
            age_group: "3-4".to_string(),
            educational_themes: vec!["".to_string()],
            length: "short".to_string(),
            cultural_source: "British".to_string(),
        };
        assert_eq!(
            validate(&request, en),
            Err(ValidationError::MissingField("educational_themes"))
        );

        request.educational_themes = vec!["courage".to_string(), "  ".to_string()];
        assert_eq!(
            validate(&request, en),
            Err(ValidationError::MissingField("educational_themes"))
        );

        request.educational_themes = vec!["courage".to_string()];
        request.region = " \t".to_string();
        assert_eq!(
            validate(&request, en),
            Err(ValidationError::MissingField("region"))
        );
    }

    #[test]
    fn repeated_themes_rejected() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let en = profiles.get("EN").unwrap();
        let request = StoryRequest {
            story_type: "fairy_tale".to_string(),
            region: "London".to_string(),
            age_group: "3-4".to_string(),
            educational_themes: vec!["courage".to_string(), "courage".to_string()],
            length: "short".to_string(),
            cultural_source: "British".to_string(),
        };
        let err = validate(&request, en).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateThemes(vec!["courage".to_string()]));
        assert_eq!(err.kind(), ValidationKind::DuplicateThemes);
        assert_eq!(
            err.to_string(),
            "educational themes listed more than once: courage"
        );

        let mut request = jp_request();
        request.educational_themes = vec![
            "勇気".to_string(),
            "知恵".to_string(),
            "勇気".to_string(),
            "勇気".to_string(),
        ];
        assert_eq!(
            validate(&request, profiles.get("JP").unwrap()),
            Err(ValidationError::DuplicateThemes(vec!["勇気".to_string()]))
        );
    }

    #[test]
    fn unsupported_region_checked_before_type() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let mut request = jp_request();
        request.region = "InvalidCity".to_string();
        request.story_type = "sonnet".to_string();
        assert_eq!(
            validate(&request, profiles.get("JP").unwrap()),
            Err(ValidationError::UnsupportedRegion("InvalidCity".to_string()))
        );
    }

    #[test]
    fn closed_type_vocabulary() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let mut request = jp_request();
        request.story_type = "idiom".to_string();
        let err = validate(&request, profiles.get("JP").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ValidationKind::UnsupportedType);
    }

    #[test]
    fn open_type_vocabulary() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let request = StoryRequest {
            story_type: "anything_goes".to_string(),
            region: "London".to_string(),
            age_group: "3-4".to_string(),
            educational_themes: vec!["whatever".to_string()],
            length: "short".to_string(),
            cultural_source: "British".to_string(),
        };
        assert!(validate(&request, profiles.get("EN").unwrap()).is_ok());
    }

    #[test]
    fn cultural_source_resolved_per_country() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let ar = profiles.get("AR").unwrap();
        let mut request = StoryRequest {
            story_type: "myth".to_string(),
            region: "Casablanca".to_string(),
            age_group: "5-6".to_string(),
            educational_themes: vec!["الحكمة".to_string()],
            length: "قصير".to_string(),
            cultural_source: "Berber".to_string(),
        };
        assert_eq!(
            validate(&request, ar).unwrap(),
            RegionLocation::Country(CountryId("morocco".to_string()))
        );

        request.cultural_source = "Coptic".to_string();
        let err = validate(&request, ar).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedCulturalSource {
                country: Some(CountryId("morocco".to_string())),
                source_name: "Coptic".to_string(),
            }
        );
        assert_eq!(err.to_string(), "unsupported cultural source for morocco: Coptic");
    }

    #[test]
    fn flat_cultural_sources() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let mut request = jp_request();
        request.cultural_source = "British".to_string();
        let err = validate(&request, profiles.get("JP").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "unsupported cultural source: British");
    }

    #[test]
    fn all_invalid_themes_reported() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let mut request = jp_request();
        request.educational_themes = vec![
            "勇気".to_string(),
            "UNKNOWN1".to_string(),
            "UNKNOWN2".to_string(),
        ];
        assert_eq!(
            validate(&request, profiles.get("JP").unwrap()),
            Err(ValidationError::UnsupportedThemes(vec![
                "UNKNOWN1".to_string(),
                "UNKNOWN2".to_string(),
            ]))
        );
    }

    #[test]
    fn open_cultural_sources_and_themes() {
        let profiles = ProfileRegistry::builtin().unwrap();
        let request = StoryRequest {
            story_type: "fairy_tale".to_string(),
            region: "华东".to_string(),
            age_group: "3-4岁".to_string(),
            educational_themes: vec!["勇气".to_string(), "智慧".to_string()],
            length: "短篇".to_string(),
            cultural_source: "浙江民间故事".to_string(),
        };
        assert!(validate(&request, profiles.get("CN").unwrap()).is_ok());
    }
}
