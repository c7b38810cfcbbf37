//! Error types for afk-core operations.

use std::path::PathBuf;

/// All errors that can occur in afk-core operations.
#[derive(Debug, thiserror::Error)]
pub enum AfkError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration write failed: {path}: {source}")]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Slack token is not configured; fill the \"token\" setting in {0}")]
    MissingToken(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Remote / System Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Slack(#[from] crate::slack::SlackError),

    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Platform not supported for this operation: {0}")]
    UnsupportedPlatform(String),
}

/// Convenience type alias for Results using AfkError.
pub type Result<T> = std::result::Result<T, AfkError>;

impl From<AfkError> for String {
    fn from(err: AfkError) -> String {
        err.to_string()
    }
}
