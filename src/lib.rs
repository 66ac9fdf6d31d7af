//! Story Collector: multilingual children's story records.
//!
//! Validates a story request against a per-language profile, derives a
//! stable identity, renders a story from a type template, formats it as
//! Markdown in the profile's language, and hands it to an external store.
//! Near-duplicate stories can be dropped by content fingerprint.
//! Languages are data: adding one means adding a RON profile.

pub mod core;
pub mod schema;
pub mod store;

pub use crate::core::pipeline::{CollectError, CollectOutcome, StoryCollector};
pub use crate::core::profiles::ProfileRegistry;
pub use crate::schema::request::StoryRequest;
pub use crate::schema::story::Story;
