//! Error types for settings persistence

use thiserror::Error;

/// Errors that can occur while loading or persisting settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;
