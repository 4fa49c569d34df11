//! Test configuration helpers for building consumers over in-memory clients

use queue_archiver::clients::{ObjectStore, QueueClient};
use queue_archiver::{BucketId, Config, Consumer, InMemoryQueue, InMemoryStore, QueueId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Queue, store and staging directory wired together for one test
pub struct TestEnv {
    /// In-memory queue service
    pub queue: Arc<InMemoryQueue>,
    /// In-memory object store
    pub store: Arc<InMemoryStore>,
    /// Provisioned queue
    pub queue_id: QueueId,
    /// Provisioned bucket
    pub bucket: BucketId,
    /// Configuration with the staging directory inside `temp_dir`
    pub config: Config,
    /// Keeps the staging directory alive
    pub temp_dir: TempDir,
}

impl TestEnv {
    /// Provision a queue and bucket and enqueue `bodies` in order
    pub async fn with_messages(bodies: &[&str]) -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.storage.staging_dir = temp_dir.path().join("data");
        config.queue.wait_time = Duration::ZERO;

        let queue = Arc::new(InMemoryQueue::new());
        let store = Arc::new(InMemoryStore::new());
        let queue_id = queue
            .ensure_queue(&config.queue.name)
            .await
            .expect("queue provisioning failed");
        let bucket = store
            .ensure_bucket(&config.storage.bucket)
            .await
            .expect("bucket provisioning failed");

        for body in bodies {
            queue.send(&queue_id, body).await.expect("send failed");
        }

        Self {
            queue,
            store,
            queue_id,
            bucket,
            config,
            temp_dir,
        }
    }

    /// Consumer over this environment's clients and current config
    pub fn consumer(&self) -> Consumer {
        Consumer::new(self.queue.clone(), self.store.clone(), &self.config)
    }

    /// Staging directory used by the consumer
    pub fn staging_dir(&self) -> PathBuf {
        self.config.storage.staging_dir.clone()
    }
}
