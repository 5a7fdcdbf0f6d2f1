//! Common error types for rebundle.

use thiserror::Error;

/// Common error type for rebundle operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("Failed to load plugin '{spec}': {reason}")]
    PluginLoad { spec: String, reason: String },

    #[error("Plugin '{plugin}' failed on entry '{entry}': {reason}")]
    PluginExecution {
        plugin: String,
        entry: String,
        reason: String,
    },

    #[error("Cannot represent bundle as {encoding}: {reason}")]
    Encoding { encoding: String, reason: String },
}

impl Error {
    /// Whether the error was raised while validating options, before any I/O.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;
