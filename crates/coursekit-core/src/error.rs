//! coursekit Error Definitions
//!
//! Defines error types used throughout the crate.

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Transcript Errors
    // =========================================================================
    #[error("Transcript parse error: {0}")]
    TranscriptParse(String),

    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f64),

    #[error("Unsupported transcript format: {0}")]
    UnsupportedFormat(String),

    // =========================================================================
    // Search Errors
    // =========================================================================
    #[error("Search request failed: {0}")]
    Transport(String),

    #[error("Search endpoint returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Settings Errors
    // =========================================================================
    #[error("Settings error: {0}")]
    SettingsError(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Returns true for failures talking to the search endpoint
    /// (network errors, non-2xx statuses, undecodable bodies).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::InvalidResponse(_)
        )
    }
}
