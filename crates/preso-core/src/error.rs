//! Error types for script handling and configuration.

use thiserror::Error;

/// Errors raised while loading, validating, or saving a presentation script.
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("invalid script: {0}")]
    Invalid(String),

    #[error("script JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for script operations
pub type ScriptResult<T> = Result<T, ScriptError>;

#[derive(Error, Debug)]
#[error("configuration error: {0}")]
pub struct ConfigError(#[from] pub config::ConfigError);
