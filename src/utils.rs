//! Utility functions and helpers.

pub mod preflight;
pub mod settings;

pub use preflight::{check_ai_credentials, check_github_token, AiCredentialInfo, AiProvider};
pub use settings::Settings;
