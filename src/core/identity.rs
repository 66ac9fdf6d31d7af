/// Story ids, titles and creation timestamps.
use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::registry::RegionLocation;
use crate::schema::profile::LanguageProfile;
use crate::schema::request::StoryRequest;
use crate::schema::story::StoryIdentity;

/// Build `{LANG}_{COUNTRY_OR_REGION}_{TYPE}_{MILLIS}`.
///
/// The middle segment is the resolved country for country-keyed profiles
/// and the raw region for flat ones. Every segment is uppercased.
pub fn story_id(
    profile: &LanguageProfile,
    request: &StoryRequest,
    location: &RegionLocation,
    at: DateTime<Utc>,
) -> String {
    let place = match location {
        RegionLocation::Country(country) => country.as_str(),
        RegionLocation::Flat => request.region.as_str(),
    };
    format!(
        "{}_{}_{}_{}",
        profile.language_code.to_uppercase(),
        place.to_uppercase(),
        request.story_type.to_uppercase(),
        at.timestamp_millis()
    )
}

/// Build `{region}_{localized type label}_{story_id}`.
pub fn title(profile: &LanguageProfile, request: &StoryRequest, story_id: &str) -> String {
    format!(
        "{}_{}_{}",
        request.region,
        profile.type_label(&request.story_type),
        story_id
    )
}

/// Compute the identity for one collection call.
pub fn build(
    profile: &LanguageProfile,
    request: &StoryRequest,
    location: &RegionLocation,
    at: DateTime<Utc>,
) -> StoryIdentity {
    let story_id = story_id(profile, request, location, at);
    let title = title(profile, request, &story_id);
    StoryIdentity { story_id, title }
}

/// ISO-8601 creation timestamp, e.g. `2024-01-01T00:00:00.000Z`.
pub fn created_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
