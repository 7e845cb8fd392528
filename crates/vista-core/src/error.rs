//! Error types for Vista Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Source errors
    #[error("Failed to resolve source {locator}: {reason}")]
    SourceResolution { locator: String, reason: String },

    #[error("Resource has no sources")]
    EmptyResource,

    #[error("Source index {index} out of range ({len} sources)")]
    SourceIndexOutOfRange { index: usize, len: usize },

    // Playback errors
    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("No session loaded")]
    NoSession,

    #[error("Player has been disposed")]
    Disposed,

    #[error("Invalid seek offset: {0}")]
    InvalidSeek(f64),

    #[error("Invalid playback rate: {0}")]
    InvalidRate(f32),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid locator: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Create a source resolution error
    pub fn unresolvable(locator: impl ToString, reason: impl Into<String>) -> Self {
        Error::SourceResolution {
            locator: locator.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if loading the source again may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SourceResolution { .. } | Error::Playback(_) | Error::NoSession
        )
    }

    /// Returns the error code for the owning screen
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::SourceResolution { .. } => "SOURCE_RESOLUTION",
            Error::EmptyResource => "EMPTY_RESOURCE",
            Error::SourceIndexOutOfRange { .. } => "SOURCE_INDEX",
            Error::Playback(_) => "PLAYBACK",
            Error::NoSession => "NO_SESSION",
            Error::Disposed => "DISPOSED",
            Error::InvalidSeek(_) => "INVALID_SEEK",
            Error::InvalidRate(_) => "INVALID_RATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Url(_) => "URL",
        }
    }
}
