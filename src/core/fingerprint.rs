/// Content fingerprints for spotting near-duplicate stories.
///
/// A fingerprint keys a story by language, region and type, and carries a
/// signature of its text: lowercase words with headings, Markdown marks
/// and punctuation removed, cut to the opening and closing words of long
/// stories. Two stories under the same key are duplicates when their
/// digests are equal or their signatures are more similar than a threshold.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schema::story::Story;

/// Signature similarity above which two stories count as the same story.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Words kept from each end of a long story's signature.
pub const SIGNATURE_EDGE_WORDS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryFingerprint {
    /// Hex SHA-256 of `language|region|story_type|signature`.
    pub digest: String,
    pub language: String,
    pub region: String,
    pub story_type: String,
    pub signature: String,
}

impl StoryFingerprint {
    /// Fingerprint a story. The title is left out: it embeds the
    /// collection timestamp, so no two titles agree.
    pub fn of(story: &Story) -> Self {
        Self::new(
            &story.language,
            &story.request.region,
            &story.request.story_type,
            &story.content,
        )
    }

    pub fn new(language: &str, region: &str, story_type: &str, content: &str) -> Self {
        let signature = content_signature(content);
        let mut hasher = Sha256::new();
        hasher.update(format!("{language}|{region}|{story_type}|{signature}").as_bytes());
        let hash: [u8; 32] = hasher.finalize().into();

        Self {
            digest: hex::encode(hash),
            language: language.to_string(),
            region: region.to_string(),
            story_type: story_type.to_string(),
            signature,
        }
    }

    /// Leading digest characters, for log lines.
    pub fn short(&self) -> &str {
        self.digest.get(..12).unwrap_or(&self.digest)
    }

    pub fn same_key(&self, other: &Self) -> bool {
        self.language == other.language
            && self.region == other.region
            && self.story_type == other.story_type
    }

    /// True when `other` is the same story as `self`: same key, and either
    /// the same digest or a signature similarity above `threshold`.
    pub fn matches(&self, other: &Self, threshold: f64) -> bool {
        if !self.same_key(other) {
            return false;
        }
        self.digest == other.digest || similarity(&self.signature, &other.signature) > threshold
    }
}

/// Lowercase words of `text` without Markdown headings, emphasis, table
/// bars, code ticks or punctuation, joined by single spaces.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(str::split_whitespace)
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cleaned text, or its first and last `SIGNATURE_EDGE_WORDS` words when
/// it runs longer than twice that.
pub fn content_signature(content: &str) -> String {
    let cleaned = clean_text(content);
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.len() <= 2 * SIGNATURE_EDGE_WORDS {
        return cleaned;
    }
    let head = &words[..SIGNATURE_EDGE_WORDS];
    let tail = &words[words.len() - SIGNATURE_EDGE_WORDS..];
    head.iter().chain(tail).copied().collect::<Vec<_>>().join(" ")
}

/// Normalized edit similarity in `[0, 1]`; two empty signatures are equal.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TALE: &str = "Once upon a time...\nThere was a dragon who...\nOne day...\nAfter that...\nAnd they lived happily ever after.";

    #[test]
    fn clean_text_strips_markup() {
        let text = "# Tokyo_童話_JP_1\n\n**Once** upon a _time_...\n| `cell` | Don't |\n  ## Info\nThe END!";
        assert_eq!(clean_text(text), "once upon a time cell dont the end");
        assert_eq!(clean_text("昔々、ある村に。"), "昔々ある村に");
        assert_eq!(clean_text("..."), "");
    }

    #[test]
    fn long_signature_keeps_both_ends() {
        let words: Vec<String> = (0..300).map(|i| format!("w{i}")).collect();
        let signature = content_signature(&words.join(" "));
        let kept: Vec<&str> = signature.split(' ').collect();
        assert_eq!(kept.len(), 2 * SIGNATURE_EDGE_WORDS);
        assert_eq!(kept[0], "w0");
        assert_eq!(kept[99], "w99");
        assert_eq!(kept[100], "w200");
        assert_eq!(kept[199], "w299");

        let short = "Just a few words.";
        assert_eq!(content_signature(short), "just a few words");
    }

    #[test]
    fn digest_is_keyed_and_ignores_markup() {
        let a = StoryFingerprint::new("JP", "Tokyo", "fairy_tale", TALE);
        let b = StoryFingerprint::new("JP", "Tokyo", "fairy_tale", &TALE.replace("...", "!"));
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 64);
        assert_eq!(a.short(), &a.digest[..12]);

        let elsewhere = StoryFingerprint::new("JP", "Kyoto", "fairy_tale", TALE);
        assert_ne!(a.digest, elsewhere.digest);
        let other_type = StoryFingerprint::new("JP", "Tokyo", "myth", TALE);
        assert_ne!(a.digest, other_type.digest);
    }

    #[test]
    fn near_duplicates_match_under_one_key() {
        let a = StoryFingerprint::new("JP", "Tokyo", "fairy_tale", TALE);
        let b = StoryFingerprint::new("JP", "Tokyo", "fairy_tale", &TALE.replace("dragon", "knight"));
        assert!(similarity(&a.signature, &b.signature) > DEFAULT_SIMILARITY_THRESHOLD);
        assert!(a.matches(&b, DEFAULT_SIMILARITY_THRESHOLD));
        assert!(!a.matches(&b, 1.0));
        assert!(a.matches(&a.clone(), 1.0));

        let unrelated = StoryFingerprint::new(
            "JP",
            "Tokyo",
            "fairy_tale",
            "A fox and a crane shared dinner, and neither could eat from the other's dish.",
        );
        assert!(!a.matches(&unrelated, DEFAULT_SIMILARITY_THRESHOLD));
    }

    #[test]
    fn different_key_never_matches() {
        let tokyo = StoryFingerprint::new("JP", "Tokyo", "fairy_tale", TALE);
        let kyoto = StoryFingerprint::new("JP", "Kyoto", "fairy_tale", TALE);
        let english = StoryFingerprint::new("EN", "Tokyo", "fairy_tale", TALE);
        assert!(!tokyo.matches(&kyoto, 0.0));
        assert!(!tokyo.matches(&english, 0.0));
        assert!(!tokyo.same_key(&kyoto));
    }

    #[test]
    fn fingerprint_of_story_uses_request_fields() {
        let story = Story {
            language: "EN".to_string(),
            request: crate::schema::request::StoryRequest {
                story_type: "myth".to_string(),
                region: "London".to_string(),
                age_group: "3-4".to_string(),
                educational_themes: vec!["courage".to_string()],
                length: "short".to_string(),
                cultural_source: "British".to_string(),
            },
            story_id: "EN_LONDON_MYTH_1".to_string(),
            title: "London_myth_EN_LONDON_MYTH_1".to_string(),
            content: "In the beginning...".to_string(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        };
        let fingerprint = StoryFingerprint::of(&story);
        assert_eq!(
            fingerprint,
            StoryFingerprint::new("EN", "London", "myth", "In the beginning...")
        );
        assert_eq!(fingerprint.signature, "in the beginning");
    }
}
