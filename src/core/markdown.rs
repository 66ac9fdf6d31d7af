/// Markdown rendering of a story record, with section headers in the
/// profile's language.
use crate::schema::profile::LanguageProfile;
use crate::schema::story::Story;

/// Render `story` as a Markdown document.
///
/// Layout: title heading, story information list, content section and
/// creation time section. The output ends with a newline.
pub fn format(story: &Story, profile: &LanguageProfile) -> String {
    let s = &profile.strings;
    let request = &story.request;
    format!(
        "# {title}\n\
         \n\
         ## {story_info}\n\
         - {id}: {story_id}\n\
         - {type_key}: {type_label}\n\
         - {region_key}: {region}\n\
         - {age_key}: {age_group}\n\
         - {themes_key}: {themes}\n\
         - {length_key}: {length}\n\
         - {source_key}: {source}\n\
         \n\
         ## {content_key}\n\
         {content}\n\
         \n\
         ## {created_key}\n\
         {created_at}\n",
        title = story.title,
        story_info = s.story_info,
        id = s.id,
        story_id = story.story_id,
        type_key = s.story_type,
        type_label = profile.type_label(&request.story_type),
        region_key = s.region,
        region = request.region,
        age_key = s.age_group,
        age_group = request.age_group,
        themes_key = s.themes,
        themes = request.educational_themes.join(", "),
        length_key = s.length,
        length = request.length,
        source_key = s.cultural_source,
        source = request.cultural_source,
        content_key = s.content,
        content = story.content,
        created_key = s.created_at,
        created_at = story.created_at,
    )
}
