//! Queue and object store clients
//!
//! The consumer only talks to the outside world through two traits:
//!
//! - [`QueueClient`]: receive / delete / send against a message queue, plus
//!   idempotent queue provisioning
//! - [`ObjectStore`]: put-object against durable storage, plus idempotent
//!   bucket provisioning
//!
//! Every method returns `Result<T, TransientError>`; deciding what a failure
//! means is left to the caller.
//!
//! Implementations:
//!
//! - [`SqsQueue`] / [`S3Store`]: AWS SDK backed clients built by [`aws::connect`]
//! - [`InMemoryQueue`] / [`InMemoryStore`]: process-local fakes with failure
//!   injection, used by tests and local dry runs
//!
//! ## Usage
//!
//! ```no_run
//! use queue_archiver::clients::{self, ObjectStore, QueueClient};
//! use queue_archiver::config::AwsConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (queue, store) = clients::aws::connect(&AwsConfig::default()).await;
//!
//! let queue_id = queue.ensure_queue("orders").await?;
//! queue.send(&queue_id, r#"{"id": 1}"#).await?;
//!
//! let bucket = store.ensure_bucket("orders-archive").await?;
//! store.put(&bucket, "hello.json", b"[]".to_vec()).await?;
//! # Ok(())
//! # }
//! ```

pub mod aws;
mod memory;

pub use aws::{S3Store, SqsQueue};
pub use memory::{InMemoryQueue, InMemoryStore};

use crate::error::TransientError;
use crate::types::{BucketId, QueueId, ReceiptToken, ReceivedMessage};
use async_trait::async_trait;
use std::time::Duration;

/// Capabilities the consumer needs from a message queue
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive up to `max_count` messages, waiting up to `wait` for arrivals
    ///
    /// An empty vector means no message became visible within the wait.
    async fn receive(
        &self,
        queue: &QueueId,
        max_count: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransientError>;

    /// Delete one received message by its receipt token
    async fn delete(&self, queue: &QueueId, receipt: &ReceiptToken) -> Result<(), TransientError>;

    /// Send one message body
    async fn send(&self, queue: &QueueId, body: &str) -> Result<(), TransientError>;

    /// Create the named queue if absent and return its identifier
    async fn ensure_queue(&self, name: &str) -> Result<QueueId, TransientError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Capabilities the archiver needs from durable object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` in `bucket`
    async fn put(&self, bucket: &BucketId, key: &str, bytes: Vec<u8>) -> Result<(), TransientError>;

    /// Create the named bucket if absent and return its identifier
    async fn ensure_bucket(&self, name: &str) -> Result<BucketId, TransientError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
