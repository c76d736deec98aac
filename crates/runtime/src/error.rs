//! Error types for the synapse runtime.

use synapse_settings::ConfigError;
use thiserror::Error;

use crate::client::ClientError;

/// Errors returned by [`crate::Synapse`] operations.
#[derive(Error, Debug)]
pub enum SynapseError {
    /// Settings could not be loaded, or a logical topic is not declared.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The local producer queue is saturated.
    #[error("Producer queue is full, could not send to topic '{topic}'")]
    QueueFull { topic: String },

    /// Any other broker or client failure (connection, authorization,
    /// unknown topic, negative delivery report, flush timeout).
    #[error("Broker error on topic '{topic}': {message}")]
    Broker { topic: String, message: String },

    /// `listen` was called after the synapse already stopped.
    #[error("Synapse has stopped and cannot listen again")]
    Stopped,

    /// `listen` was called while another `listen` is running.
    #[error("Synapse is already listening")]
    AlreadyListening,
}

impl SynapseError {
    pub(crate) fn client(topic: &str, err: ClientError) -> Self {
        match err {
            ClientError::QueueFull => Self::QueueFull {
                topic: topic.to_string(),
            },
            ClientError::Broker(message) | ClientError::Poll(message) => Self::Broker {
                topic: topic.to_string(),
                message,
            },
        }
    }
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, SynapseError>;
