//! Error types for storage and alert playback
//!
//! Timer, history and settings operations never surface these to callers;
//! they are logged and the affected state falls back to its default.

use thiserror::Error;

/// Result type for key-value storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the flat key-value storage layer
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the value for a key failed
    #[error("Storage I/O failed for key '{key}': {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },

    /// A stored value could not be encoded or decoded as JSON
    #[error("Malformed JSON for key '{key}': {source}")]
    Json {
        key: String,
        source: serde_json::Error,
    },

    /// Key contains characters that cannot be mapped to a storage slot
    #[error("Invalid storage key: '{0}'")]
    InvalidKey(String),
}

/// Errors raised while playing a completion sound or vibration
#[derive(Debug, Error)]
pub enum AlertError {
    /// The platform has no way to perform this alert
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    /// The player program could not be launched
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The player program ran but reported failure
    #[error("{program} exited with failure: {stderr}")]
    PlayerFailed { program: String, stderr: String },

    /// Writing the synthesized tone to a scratch file failed
    #[error("Failed to prepare tone: {0}")]
    Tone(#[from] std::io::Error),
}
