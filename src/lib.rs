//! # queue-archiver
//!
//! Moves messages from a queue into batched, timestamped archive files in
//! object storage.
//!
//! A consumer run polls the queue until a receive comes back empty, keeps each
//! body in memory and deletes the message right after recording it. The
//! collected batch is then written to a local JSON file, uploaded to the
//! object store under the file's name, and the local copy is removed.
//!
//! ## Delivery trade-offs
//!
//! - Messages are deleted before the archive is uploaded. A crash in between,
//!   or a failed upload, loses them from the queue; after a failed upload the
//!   staged file in the staging directory is the only remaining copy.
//! - A failed delete leaves the message in the queue, so it can be archived
//!   again by a later run (at-least-once).
//! - Nothing here coordinates multiple consumers on one queue.
//!
//! ## Quick Start
//!
//! ```no_run
//! use queue_archiver::{Config, Consumer, clients};
//! use queue_archiver::clients::{ObjectStore, QueueClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let (queue, store) = clients::aws::connect(&config.aws).await;
//!
//!     let queue_id = queue.ensure_queue(&config.queue.name).await?;
//!     let bucket = store.ensure_bucket(&config.storage.bucket).await?;
//!
//!     let consumer = Consumer::new(Arc::new(queue), Arc::new(store), &config);
//!     let report = consumer.run(&queue_id, &bucket).await;
//!     println!("archived {} message(s): {:?}", report.received, report.outcome);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Queue and object store clients
pub mod clients;
/// Configuration types
pub mod config;
/// Drain loop, archiver and run orchestration
pub mod consumer;
/// Error types
pub mod error;
/// Provisioning, seeding and repeated runs
pub mod pipeline;
/// Single-message send and generated test data
pub mod producer;
/// Core types
pub mod types;

// Re-export commonly used types
pub use clients::{InMemoryQueue, InMemoryStore, ObjectStore, QueueClient, S3Store, SqsQueue};
pub use config::Config;
pub use consumer::{Archiver, Consumer};
pub use error::{Error, Result, TransientError};
pub use pipeline::{Pipeline, Resources, RunSummary, wait_for_signal};
pub use types::{
    Batch, BucketId, QueueId, ReceiptToken, ReceivedMessage, RunOutcome, RunReport, RunState,
    StagedArtifact,
};
