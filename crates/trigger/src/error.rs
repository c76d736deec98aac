//! Error types for the trigger.

use axum::http::StatusCode;
use std::path::PathBuf;
use synapse_runtime::SynapseError;
use thiserror::Error;

/// Errors raised while resolving or firing an action profile.
#[derive(Error, Debug)]
pub enum TriggerError {
    /// A request segment could be used to escape the events directory.
    #[error("Invalid path segment '{segment}': {reason}")]
    InvalidSegment {
        segment: String,
        reason: &'static str,
    },

    #[error("Action profile not found: {}", .0.display())]
    ProfileNotFound(PathBuf),

    #[error("Failed to read action profile {}: {source}", path.display())]
    ProfileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse action profile {}: {source}", path.display())]
    ProfileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode action for topic '{topic}': {source}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Synapse(#[from] SynapseError),
}

impl TriggerError {
    /// HTTP status reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidSegment { .. } => StatusCode::BAD_REQUEST,
            Self::ProfileNotFound(_) => StatusCode::NOT_FOUND,
            Self::ProfileRead { .. }
            | Self::ProfileParse { .. }
            | Self::Encode { .. }
            | Self::Synapse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for trigger operations.
pub type Result<T> = std::result::Result<T, TriggerError>;
