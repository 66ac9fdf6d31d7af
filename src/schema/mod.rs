pub mod profile;
pub mod request;
pub mod story;
