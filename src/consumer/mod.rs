//! Consumer orchestrator
//!
//! One run drains the queue to exhaustion, then archives what was collected:
//!
//! ```text
//! Idle -> Draining -> [FailedPoll] -> Archiving -> Publishing -> [FailedPublish] -> Done
//!                  \-> Done   (empty drain, archive_empty_batches = false)
//! ```
//!
//! Draining and archiving never overlap, and nothing inside a run is spawned.
//! Messages are deleted from the queue while draining, before the artifact is
//! uploaded. A crash or a failed upload after that point loses those messages
//! from the queue; after a failed upload the only copy is the staged file left
//! in the staging directory.
//!
//! The run is the failure boundary: staging and publishing errors are logged
//! and recorded in the [`RunReport`], never returned.

pub mod archive;
pub mod drain;

pub use archive::Archiver;
pub use drain::{DrainOutcome, DrainSettings, drain};

use crate::clients::{ObjectStore, QueueClient};
use crate::config::Config;
use crate::types::{BucketId, QueueId, RunOutcome, RunReport, RunState};
use std::sync::Arc;

/// Drains a queue into archived batches
pub struct Consumer {
    queue: Arc<dyn QueueClient>,
    store: Arc<dyn ObjectStore>,
    settings: DrainSettings,
    archiver: Archiver,
    archive_empty_batches: bool,
}

impl Consumer {
    /// Create a consumer over explicit clients
    pub fn new(queue: Arc<dyn QueueClient>, store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        Self {
            queue,
            store,
            settings: DrainSettings {
                batch_size: config.queue.batch_size,
                wait_time: config.queue.wait_time,
            },
            archiver: Archiver::new(config.storage.staging_dir.clone(), &config.archive),
            archive_empty_batches: config.archive.archive_empty_batches,
        }
    }

    /// Run one drain-and-archive cycle
    pub async fn run(&self, queue_id: &QueueId, bucket: &BucketId) -> RunReport {
        let mut states = vec![RunState::Idle];
        let mut enter = |state: RunState| {
            tracing::debug!(state = %state, "Consumer state transition");
            states.push(state);
        };

        tracing::info!(
            queue = %queue_id,
            bucket = %bucket,
            queue_client = self.queue.name(),
            store_client = self.store.name(),
            "Starting consumer run"
        );

        enter(RunState::Draining);
        let drained = drain(self.queue.as_ref(), queue_id, self.settings).await;
        if drained.poll_failed {
            enter(RunState::FailedPoll);
        }

        let outcome = if drained.batch.is_empty() && !self.archive_empty_batches {
            tracing::info!("Nothing drained, skipping archive");
            RunOutcome::SkippedEmpty
        } else {
            enter(RunState::Archiving);
            match self.archiver.stage(&drained.batch).await {
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        count = drained.batch.len(),
                        "Failed to stage artifact, drained messages are lost"
                    );
                    RunOutcome::StageFailed
                }
                Ok(artifact) => {
                    enter(RunState::Publishing);
                    match self
                        .archiver
                        .publish(&artifact, self.store.as_ref(), bucket)
                        .await
                    {
                        Ok(()) => RunOutcome::Published { key: artifact.key },
                        Err(e) => {
                            enter(RunState::FailedPublish);
                            tracing::error!(
                                error = %e,
                                file = %artifact.path.display(),
                                count = artifact.count,
                                "Failed to publish artifact, local copy left for manual recovery"
                            );
                            RunOutcome::PublishFailed {
                                staged_path: artifact.path,
                            }
                        }
                    }
                }
            }
        };

        enter(RunState::Done);

        let report = RunReport {
            states,
            polls: drained.polls,
            received: drained.batch.len(),
            deleted: drained.deleted,
            delete_failures: drained.delete_failures,
            poll_failed: drained.poll_failed,
            outcome,
        };

        tracing::info!(
            received = report.received,
            deleted = report.deleted,
            delete_failures = report.delete_failures,
            published = report.is_published(),
            "Consumer run finished"
        );

        report
    }
}
