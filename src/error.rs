//! Error types for queue-archiver
//!
//! Two layers are used:
//! - [`TransientError`] is what every remote capability (queue, object store,
//!   provisioning) returns. It is always caught by the consumer and logged.
//! - [`Error`] is the crate-level error for local work (configuration, staging
//!   files, serialization) and wraps [`TransientError`] when a remote failure
//!   has to cross a module boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for queue-archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for queue-archiver
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "BATCH_SIZE")
        key: Option<String>,
    },

    /// A remote call against the queue or object store failed
    #[error(transparent)]
    Transient(#[from] TransientError),

    /// I/O error while staging or reading an artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Staged artifact could not be read back
    #[error("staged artifact {path} is unreadable: {reason}")]
    StagedArtifact {
        /// Local path of the staged file
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Returns true when the error came from a remote call
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

/// Failure of a single remote call (network, throttling, permission)
///
/// There is no fatal counterpart: callers degrade to "skip and continue" or
/// "abandon this run quietly".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransientError {
    /// Polling the queue failed
    #[error("failed to receive from queue {queue}: {reason}")]
    Receive {
        /// Queue identifier (URL)
        queue: String,
        /// Underlying failure
        reason: String,
    },

    /// Deleting a received message failed
    #[error("failed to delete message from queue {queue}: {reason}")]
    Delete {
        /// Queue identifier (URL)
        queue: String,
        /// Underlying failure
        reason: String,
    },

    /// Sending a message failed
    #[error("failed to send message to queue {queue}: {reason}")]
    Send {
        /// Queue identifier (URL)
        queue: String,
        /// Underlying failure
        reason: String,
    },

    /// Uploading an object failed
    #[error("failed to put {key} into bucket {bucket}: {reason}")]
    Put {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// Underlying failure
        reason: String,
    },

    /// Creating (or looking up) a queue or bucket failed
    #[error("failed to provision {resource} {name}: {reason}")]
    Provision {
        /// Kind of resource ("queue" or "bucket")
        resource: &'static str,
        /// Requested resource name
        name: String,
        /// Underlying failure
        reason: String,
    },
}
