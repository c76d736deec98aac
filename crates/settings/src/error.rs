//! Error types for the settings loader.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading settings or resolving values from them.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file is missing or unreadable.
    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON or does not have the expected shape.
    #[error("Failed to parse settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A logical topic name is not declared under `kafka.topics`.
    #[error("Unknown logical topic '{0}': not declared in kafka.topics")]
    UnknownTopic(String),

    /// A custom top-level section exists but does not match the requested type.
    #[error("Invalid settings section '{name}': {source}")]
    Section {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
