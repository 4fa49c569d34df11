//! Core types shared by the clients and the consumer

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of a provisioned queue (the SQS queue URL)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(pub String);

impl QueueId {
    /// Create a new QueueId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a provisioned bucket
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketId(pub String);

impl BucketId {
    /// Create a new BucketId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery-scoped handle that is the only way to delete a received message
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReceiptToken(pub String);

impl ReceiptToken {
    /// Borrow the underlying handle
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A message as delivered by a receive call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Opaque message body
    pub body: String,
    /// Receipt token for this delivery
    pub receipt: ReceiptToken,
}

impl ReceivedMessage {
    /// Create a new ReceivedMessage
    pub fn new(body: impl Into<String>, receipt: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            receipt: ReceiptToken(receipt.into()),
        }
    }
}

/// Message bodies accumulated during one drain cycle
///
/// Order follows receipt order within a poll. Across polls it is whatever the
/// queue handed out, which is not a global order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    bodies: Vec<String>,
}

impl Batch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a body
    pub fn push(&mut self, body: String) {
        self.bodies.push(body);
    }

    /// Number of bodies in the batch
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the batch has no bodies
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Borrow the bodies in order
    pub fn bodies(&self) -> &[String] {
        &self.bodies
    }

    /// Take the bodies out of the batch
    pub fn into_bodies(self) -> Vec<String> {
        self.bodies
    }
}

impl From<Vec<String>> for Batch {
    fn from(bodies: Vec<String>) -> Self {
        Self { bodies }
    }
}

/// A serialized batch written to the local staging directory
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedArtifact {
    /// Local path of the staged file
    pub path: PathBuf,
    /// Object key the file is published under (its base file name)
    pub key: String,
    /// Number of bodies in the artifact
    pub count: usize,
}

/// States a consumer run moves through
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run created, nothing done yet
    Idle,
    /// Polling and deleting messages
    Draining,
    /// A poll failed; drain ended early with what was collected
    FailedPoll,
    /// Serializing the batch to the staging directory
    Archiving,
    /// Uploading the staged artifact
    Publishing,
    /// Upload failed; the staged file was left behind
    FailedPublish,
    /// Run finished (always the last state)
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Draining => "draining",
            RunState::FailedPoll => "failed_poll",
            RunState::Archiving => "archiving",
            RunState::Publishing => "publishing",
            RunState::FailedPublish => "failed_publish",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a consumer run ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Artifact uploaded under this key
    Published {
        /// Object key of the uploaded artifact
        key: String,
    },
    /// Nothing drained and empty batches are not archived
    SkippedEmpty,
    /// The batch could not be written to the staging directory
    StageFailed,
    /// Upload failed; the staged file remains at this path
    PublishFailed {
        /// Orphaned local artifact
        staged_path: PathBuf,
    },
}

/// Summary of one consumer run, for diagnostics and tests
///
/// Failures are reported here instead of being returned as errors; a failed
/// cycle never takes the host process down.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// States visited, in order, ending with [`RunState::Done`]
    pub states: Vec<RunState>,
    /// Receive calls issued (including the final empty or failed one)
    pub polls: usize,
    /// Messages received and recorded in the batch
    pub received: usize,
    /// Messages deleted from the queue
    pub deleted: usize,
    /// Messages whose delete failed (still in the queue, may be redelivered)
    pub delete_failures: usize,
    /// Whether the drain ended because of a poll failure
    pub poll_failed: bool,
    /// Final outcome
    pub outcome: RunOutcome,
}

impl RunReport {
    /// Whether an artifact reached the object store
    pub fn is_published(&self) -> bool {
        matches!(self.outcome, RunOutcome::Published { .. })
    }
}
