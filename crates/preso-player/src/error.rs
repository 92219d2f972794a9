//! Error types for cue playback

use thiserror::Error;

/// Result type alias for player operations
pub type PlayerResult<T> = Result<T, PlayerError>;

/// Errors that abort a playback run
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("no media could be shown for slide {slide} (tried {})", tried.join(", "))]
    MediaNotFound { slide: u32, tried: Vec<String> },

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),
}

/// Failures reported by a [`crate::SlideDisplay`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    #[error("media not found: {0}")]
    NotFound(String),

    #[error("failed to load {name}: {message}")]
    Load { name: String, message: String },

    #[error("timed out loading {0}")]
    Timeout(String),
}
