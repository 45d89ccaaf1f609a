//! Error types for the regimen_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for regimen_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The regimen model breaks a structural or referential invariant
    #[error("Validation error: {0}")]
    Validation(String),

    /// A runtime parameter is missing or an unimplemented option was selected
    #[error("Configuration error: {0}")]
    Config(String),

    /// A day could not be resolved to a valid plan
    #[error("Domain error: {0}")]
    Domain(String),
}
