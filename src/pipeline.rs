//! End-to-end wiring: provision, optionally seed, then consume
//!
//! A [`Pipeline`] owns the two clients for the lifetime of the process and
//! hands them to a fresh [`Consumer`] for each run.

use crate::clients::{ObjectStore, QueueClient};
use crate::config::Config;
use crate::consumer::Consumer;
use crate::error::Result;
use crate::producer;
use crate::types::{BucketId, QueueId, RunReport};
use rand::Rng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Queue and bucket resolved by provisioning
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resources {
    /// Queue identifier
    pub queue: QueueId,
    /// Bucket identifier
    pub bucket: BucketId,
}

/// Provisioning plus consumer runs over one pair of clients
pub struct Pipeline {
    queue: Arc<dyn QueueClient>,
    store: Arc<dyn ObjectStore>,
    config: Config,
}

impl Pipeline {
    /// Create a pipeline over explicit clients
    pub fn new(queue: Arc<dyn QueueClient>, store: Arc<dyn ObjectStore>, config: Config) -> Self {
        Self {
            queue,
            store,
            config,
        }
    }

    /// Configuration the pipeline runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create the queue and bucket if absent
    ///
    /// Unlike consumer failures these are returned: nothing can be drained
    /// without a queue identifier.
    pub async fn provision(&self) -> Result<Resources> {
        let queue = self.queue.ensure_queue(&self.config.queue.name).await?;
        tracing::info!(queue = %queue, "Queue ready");

        let bucket = self.store.ensure_bucket(&self.config.storage.bucket).await?;
        tracing::info!(bucket = %bucket, "Bucket ready");

        Ok(Resources { queue, bucket })
    }

    /// Seed the queue with a random number of generated users, if enabled
    ///
    /// Returns the number of messages sent.
    pub async fn seed(&self, queue: &QueueId) -> usize {
        let producer = &self.config.producer;
        if !producer.enabled {
            return 0;
        }
        let count = rand::thread_rng().gen_range(producer.min_messages..=producer.max_messages);
        producer::seed_queue(self.queue.as_ref(), queue, count).await
    }

    /// Provision, seed and run the consumer once
    pub async fn run_once(&self) -> Result<RunReport> {
        let resources = self.provision().await?;
        self.seed(&resources.queue).await;

        let consumer = Consumer::new(self.queue.clone(), self.store.clone(), &self.config);
        Ok(consumer.run(&resources.queue, &resources.bucket).await)
    }

    /// Repeat runs every `schedule.interval` until `token` is cancelled
    ///
    /// Without an interval this performs a single run. Cancellation is only
    /// observed between runs, so a run in progress always finishes. Only the
    /// counters and the latest report are kept across runs.
    pub async fn run_until_cancelled(&self, token: CancellationToken) -> Result<RunSummary> {
        let resources = self.provision().await?;
        let consumer = Consumer::new(self.queue.clone(), self.store.clone(), &self.config);
        let mut summary = RunSummary::default();

        loop {
            self.seed(&resources.queue).await;
            summary.record(consumer.run(&resources.queue, &resources.bucket).await);

            let Some(interval) = self.config.schedule.interval else {
                break;
            };
            if token.is_cancelled() {
                break;
            }

            tracing::debug!(interval_secs = interval.as_secs(), "Waiting for next run");
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!(runs = summary.runs, "Shutdown requested, no further runs");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        Ok(summary)
    }
}

/// Totals over the runs made by [`Pipeline::run_until_cancelled`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Consumer runs completed
    pub runs: usize,
    /// Runs whose artifact reached the object store
    pub published: usize,
    /// Messages received across all runs
    pub received: usize,
    /// Most recent run
    pub last: Option<RunReport>,
}

impl RunSummary {
    fn record(&mut self, report: RunReport) {
        self.runs += 1;
        self.received += report.received;
        if report.is_published() {
            self.published += 1;
        }
        self.last = Some(report);
    }
}

/// Block until the process is asked to stop
///
/// On Unix this is SIGTERM (container and service managers) or SIGINT. If the
/// SIGTERM handler cannot be installed only SIGINT is honored.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, archiver stops on SIGINT only");
            None
        }
    };
    let terminate = async {
        match sigterm.as_mut() {
            Some(sigterm) => {
                sigterm.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("SIGINT received, archiver stopping after the current run"),
            Err(e) => tracing::error!(error = %e, "Cannot listen for SIGINT, stopping archiver"),
        },
        _ = terminate => {
            tracing::info!("SIGTERM received, archiver stopping after the current run");
        }
    }
}

/// Block until Ctrl+C is pressed
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl+C received, archiver stopping after the current run"),
        Err(e) => tracing::error!(error = %e, "Cannot listen for Ctrl+C, stopping archiver"),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{InMemoryQueue, InMemoryStore};
    use crate::types::{RunOutcome, RunState};
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.staging_dir = dir.path().join("data");
        config.queue.wait_time = Duration::ZERO;
        config
    }

    #[tokio::test]
    async fn provision_creates_queue_and_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(Arc::new(InMemoryQueue::new()), store.clone(), config(&dir));

        let resources = pipeline.provision().await.unwrap();

        assert_eq!(resources.queue.as_str(), "memory://aws-sqs-to-s3-etl-queue");
        assert_eq!(resources.bucket.as_str(), "aws-sqs-to-s3-etl-bucket");
    }

    #[tokio::test]
    async fn provisioning_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.set_available(false).await;
        let pipeline = Pipeline::new(Arc::new(InMemoryQueue::new()), store, config(&dir));

        let err = pipeline.run_once().await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn seeded_run_archives_every_generated_user() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.producer.enabled = true;
        config.producer.min_messages = 4;
        config.producer.max_messages = 4;
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(Arc::new(InMemoryQueue::new()), store.clone(), config);

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(report.received, 4);
        let RunOutcome::Published { key } = &report.outcome else {
            panic!("expected a published artifact, got {:?}", report.outcome);
        };
        let bucket = BucketId::new("aws-sqs-to-s3-etl-bucket");
        let bytes = store.get(&bucket, key).await.unwrap();
        let bodies = crate::consumer::archive::decode_artifact(&bytes).unwrap();
        assert_eq!(bodies.len(), 4);
        for body in bodies {
            serde_json::from_str::<producer::UserRecord>(&body).unwrap();
        }
    }

    #[tokio::test]
    async fn seeding_is_off_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(InMemoryQueue::new());
        let pipeline = Pipeline::new(queue.clone(), Arc::new(InMemoryStore::new()), config(&dir));
        let resources = pipeline.provision().await.unwrap();

        assert_eq!(pipeline.seed(&resources.queue).await, 0);
        assert_eq!(queue.visible_len(&resources.queue).await, 0);
    }

    #[tokio::test]
    async fn without_interval_a_single_run_is_made() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            Arc::new(InMemoryQueue::new()),
            Arc::new(InMemoryStore::new()),
            config(&dir),
        );

        let summary = pipeline
            .run_until_cancelled(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.runs, 1);
        assert!(summary.last.is_some_and(|r| r.is_published()));
    }

    #[tokio::test]
    async fn cancellation_stops_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.schedule.interval = Some(Duration::from_secs(3600));
        let pipeline = Pipeline::new(
            Arc::new(InMemoryQueue::new()),
            Arc::new(InMemoryStore::new()),
            config,
        );
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            pipeline.run_until_cancelled(token),
        )
        .await
        .expect("cancellation should end the loop well before the interval")
        .unwrap();

        assert_eq!(summary.runs, 1, "first run completes, then the wait is cut short");
    }

    #[tokio::test]
    async fn already_cancelled_token_still_completes_one_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.schedule.interval = Some(Duration::from_secs(3600));
        let pipeline = Pipeline::new(
            Arc::new(InMemoryQueue::new()),
            Arc::new(InMemoryStore::new()),
            config,
        );
        let token = CancellationToken::new();
        token.cancel();

        let summary = pipeline.run_until_cancelled(token).await.unwrap();

        assert_eq!(summary.runs, 1);
    }

    #[tokio::test]
    async fn many_runs_keep_only_totals_and_last_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.schedule.interval = Some(Duration::from_millis(1));
        config.producer.enabled = true;
        config.producer.min_messages = 2;
        config.producer.max_messages = 2;
        let store = Arc::new(InMemoryStore::new());
        let pipeline = Pipeline::new(Arc::new(InMemoryQueue::new()), store.clone(), config);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let summary = pipeline.run_until_cancelled(token).await.unwrap();

        assert!(summary.runs > 1, "1ms interval should allow several runs");
        assert_eq!(summary.published, summary.runs);
        assert_eq!(summary.received, 2 * summary.runs);
        let last = summary.last.expect("last report retained");
        assert_eq!(last.received, 2, "last holds one run, not an accumulation");
        assert_eq!(
            store
                .keys(&BucketId::new("aws-sqs-to-s3-etl-bucket"))
                .await
                .len(),
            summary.runs
        );
    }

    #[test]
    fn summary_counts_without_retaining_history() {
        let report = |received, outcome| RunReport {
            states: vec![RunState::Idle, RunState::Draining, RunState::Done],
            polls: 1,
            received,
            deleted: received,
            delete_failures: 0,
            poll_failed: false,
            outcome,
        };
        let mut summary = RunSummary::default();

        summary.record(report(3, RunOutcome::Published { key: "a.json".to_string() }));
        summary.record(report(0, RunOutcome::SkippedEmpty));
        summary.record(report(1, RunOutcome::StageFailed));

        assert_eq!(summary.runs, 3);
        assert_eq!(summary.published, 1);
        assert_eq!(summary.received, 4);
        assert_eq!(summary.last.map(|r| r.outcome), Some(RunOutcome::StageFailed));
    }

    #[tokio::test]
    async fn signal_wait_does_not_return_on_its_own() {
        let waited = tokio::time::timeout(Duration::from_millis(50), wait_for_signal()).await;
        assert!(waited.is_err(), "only a signal ends the wait");
    }
}
