pub mod clock;
pub mod fingerprint;
pub mod identity;
pub mod markdown;
pub mod pipeline;
pub mod profiles;
pub mod registry;
pub mod template;
pub mod validator;
