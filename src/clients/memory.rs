//! In-memory queue and object store with failure injection
//!
//! These behave like the remote services closely enough to exercise the
//! consumer's failure handling: received messages stay in flight until they
//! are deleted by their receipt token, and a failed delete leaves the message
//! (and its token) untouched.

use super::{ObjectStore, QueueClient};
use crate::error::TransientError;
use crate::types::{BucketId, QueueId, ReceiptToken, ReceivedMessage};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct QueueState {
    queues: HashSet<String>,
    visible: HashMap<String, VecDeque<String>>,
    /// receipt token -> (queue, body)
    in_flight: HashMap<String, (String, String)>,
    next_receipt: u64,
    polls: usize,
    failing_polls: HashSet<usize>,
    failing_bodies: HashSet<String>,
    delete_attempts: HashMap<String, usize>,
}

/// Process-local queue
///
/// Queue identifiers are the queue names prefixed with `memory://`.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    /// Create an empty queue service
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `poll`-th receive call (1-based, across all queues) fail
    pub async fn fail_receive_on_poll(&self, poll: usize) {
        self.state.lock().await.failing_polls.insert(poll);
    }

    /// Make every delete of a message with this body fail
    pub async fn fail_delete_for_body(&self, body: impl Into<String>) {
        self.state.lock().await.failing_bodies.insert(body.into());
    }

    /// Stop failing deletes
    pub async fn clear_delete_failures(&self) {
        self.state.lock().await.failing_bodies.clear();
    }

    /// Return every in-flight message to its queue, as a visibility timeout would
    ///
    /// The old receipt tokens stop working; redelivery issues new ones.
    pub async fn release_in_flight(&self) -> usize {
        let mut state = self.state.lock().await;
        let released: Vec<(String, String)> = state.in_flight.drain().map(|(_, v)| v).collect();
        let count = released.len();
        for (queue, body) in released {
            state.visible.entry(queue).or_default().push_back(body);
        }
        count
    }

    /// Messages waiting to be received
    pub async fn visible_len(&self, queue: &QueueId) -> usize {
        self.state
            .lock()
            .await
            .visible
            .get(queue.as_str())
            .map_or(0, VecDeque::len)
    }

    /// Messages received but not yet deleted
    pub async fn in_flight_len(&self, queue: &QueueId) -> usize {
        self.state
            .lock()
            .await
            .in_flight
            .values()
            .filter(|(q, _)| q == queue.as_str())
            .count()
    }

    /// Whether a receipt token still refers to an undeleted delivery
    pub async fn is_in_flight(&self, receipt: &ReceiptToken) -> bool {
        self.state
            .lock()
            .await
            .in_flight
            .contains_key(receipt.as_str())
    }

    /// Number of delete calls issued with this receipt token
    pub async fn delete_attempts(&self, receipt: &ReceiptToken) -> usize {
        self.state
            .lock()
            .await
            .delete_attempts
            .get(receipt.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Receipt tokens of every in-flight message with this body
    pub async fn receipts_for_body(&self, body: &str) -> Vec<ReceiptToken> {
        self.state
            .lock()
            .await
            .in_flight
            .iter()
            .filter(|(_, (_, b))| b == body)
            .map(|(token, _)| ReceiptToken(token.clone()))
            .collect()
    }

    /// Receive calls issued so far
    pub async fn polls(&self) -> usize {
        self.state.lock().await.polls
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn receive(
        &self,
        queue: &QueueId,
        max_count: usize,
        _wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransientError> {
        let mut state = self.state.lock().await;
        state.polls += 1;

        if state.failing_polls.contains(&state.polls) {
            return Err(TransientError::Receive {
                queue: queue.to_string(),
                reason: format!("injected failure on poll {}", state.polls),
            });
        }
        if !state.queues.contains(queue.as_str()) {
            return Err(TransientError::Receive {
                queue: queue.to_string(),
                reason: "queue does not exist".to_string(),
            });
        }

        let mut delivered = Vec::new();
        while delivered.len() < max_count {
            let Some(body) = state
                .visible
                .get_mut(queue.as_str())
                .and_then(VecDeque::pop_front)
            else {
                break;
            };
            state.next_receipt += 1;
            let receipt = format!("receipt-{}", state.next_receipt);
            state
                .in_flight
                .insert(receipt.clone(), (queue.as_str().to_string(), body.clone()));
            delivered.push(ReceivedMessage::new(body, receipt));
        }

        Ok(delivered)
    }

    async fn delete(&self, queue: &QueueId, receipt: &ReceiptToken) -> Result<(), TransientError> {
        let mut state = self.state.lock().await;
        *state
            .delete_attempts
            .entry(receipt.as_str().to_string())
            .or_default() += 1;

        let Some((owner, body)) = state.in_flight.get(receipt.as_str()) else {
            return Err(TransientError::Delete {
                queue: queue.to_string(),
                reason: "receipt handle is invalid".to_string(),
            });
        };
        if owner != queue.as_str() {
            return Err(TransientError::Delete {
                queue: queue.to_string(),
                reason: "receipt handle belongs to another queue".to_string(),
            });
        }
        if state.failing_bodies.contains(body) {
            return Err(TransientError::Delete {
                queue: queue.to_string(),
                reason: "injected delete failure".to_string(),
            });
        }

        state.in_flight.remove(receipt.as_str());
        Ok(())
    }

    async fn send(&self, queue: &QueueId, body: &str) -> Result<(), TransientError> {
        let mut state = self.state.lock().await;
        if !state.queues.contains(queue.as_str()) {
            return Err(TransientError::Send {
                queue: queue.to_string(),
                reason: "queue does not exist".to_string(),
            });
        }
        state
            .visible
            .entry(queue.as_str().to_string())
            .or_default()
            .push_back(body.to_string());
        Ok(())
    }

    async fn ensure_queue(&self, name: &str) -> Result<QueueId, TransientError> {
        if name.is_empty() {
            return Err(TransientError::Provision {
                resource: "queue",
                name: name.to_string(),
                reason: "queue name must not be empty".to_string(),
            });
        }
        let id = format!("memory://{name}");
        self.state.lock().await.queues.insert(id.clone());
        Ok(QueueId(id))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug)]
struct StoreState {
    available: bool,
    buckets: HashMap<String, HashMap<String, Vec<u8>>>,
}

/// Process-local object store
#[derive(Debug)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(StoreState {
                available: true,
                buckets: HashMap::new(),
            }),
        }
    }
}

impl InMemoryStore {
    /// Create an empty, available store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.available = available;
    }

    /// Object bytes under `key`, if present
    pub async fn get(&self, bucket: &BucketId, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .await
            .buckets
            .get(bucket.as_str())
            .and_then(|objects| objects.get(key).cloned())
    }

    /// Sorted keys stored in `bucket`
    pub async fn keys(&self, bucket: &BucketId) -> Vec<String> {
        let state = self.state.lock().await;
        let mut keys: Vec<String> = state
            .buckets
            .get(bucket.as_str())
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(&self, bucket: &BucketId, key: &str, bytes: Vec<u8>) -> Result<(), TransientError> {
        let mut state = self.state.lock().await;
        if !state.available {
            return Err(TransientError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "service unavailable".to_string(),
            });
        }
        let Some(objects) = state.buckets.get_mut(bucket.as_str()) else {
            return Err(TransientError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "bucket does not exist".to_string(),
            });
        };
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn ensure_bucket(&self, name: &str) -> Result<BucketId, TransientError> {
        let mut state = self.state.lock().await;
        if !state.available {
            return Err(TransientError::Provision {
                resource: "bucket",
                name: name.to_string(),
                reason: "service unavailable".to_string(),
            });
        }
        state.buckets.entry(name.to_string()).or_default();
        Ok(BucketId::new(name))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(0);

    #[tokio::test]
    async fn ensure_queue_is_idempotent() {
        let queue = InMemoryQueue::new();
        let first = queue.ensure_queue("orders").await.unwrap();
        queue.send(&first, "a").await.unwrap();

        let second = queue.ensure_queue("orders").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(queue.visible_len(&second).await, 1, "existing messages survive");
    }

    #[tokio::test]
    async fn receive_respects_max_count_and_order() {
        let queue = InMemoryQueue::new();
        let id = queue.ensure_queue("orders").await.unwrap();
        for body in ["a", "b", "c"] {
            queue.send(&id, body).await.unwrap();
        }

        let first = queue.receive(&id, 2, WAIT).await.unwrap();
        let second = queue.receive(&id, 2, WAIT).await.unwrap();
        let third = queue.receive(&id, 2, WAIT).await.unwrap();

        let bodies: Vec<_> = first.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["a", "b"]);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, "c");
        assert!(third.is_empty());
        assert_eq!(queue.in_flight_len(&id).await, 3);
        assert_eq!(queue.polls().await, 3);
    }

    #[tokio::test]
    async fn delete_by_receipt_removes_message() {
        let queue = InMemoryQueue::new();
        let id = queue.ensure_queue("orders").await.unwrap();
        queue.send(&id, "a").await.unwrap();

        let received = queue.receive(&id, 10, WAIT).await.unwrap();
        queue.delete(&id, &received[0].receipt).await.unwrap();

        assert!(!queue.is_in_flight(&received[0].receipt).await);
        assert_eq!(queue.in_flight_len(&id).await, 0);
        assert!(
            queue.delete(&id, &received[0].receipt).await.is_err(),
            "a consumed receipt cannot delete twice"
        );
    }

    #[tokio::test]
    async fn injected_delete_failure_keeps_receipt_valid() {
        let queue = InMemoryQueue::new();
        let id = queue.ensure_queue("orders").await.unwrap();
        queue.send(&id, "poison").await.unwrap();
        queue.fail_delete_for_body("poison").await;

        let received = queue.receive(&id, 10, WAIT).await.unwrap();
        let receipt = &received[0].receipt;
        assert!(queue.delete(&id, receipt).await.is_err());
        assert!(queue.is_in_flight(receipt).await);

        queue.clear_delete_failures().await;
        queue.delete(&id, receipt).await.unwrap();
        assert_eq!(queue.delete_attempts(receipt).await, 2);
    }

    #[tokio::test]
    async fn released_messages_are_redelivered_with_new_receipts() {
        let queue = InMemoryQueue::new();
        let id = queue.ensure_queue("orders").await.unwrap();
        queue.send(&id, "a").await.unwrap();

        let first = queue.receive(&id, 10, WAIT).await.unwrap();
        assert_eq!(queue.release_in_flight().await, 1);
        let second = queue.receive(&id, 10, WAIT).await.unwrap();

        assert_eq!(second[0].body, "a");
        assert_ne!(first[0].receipt, second[0].receipt);
        assert!(!queue.is_in_flight(&first[0].receipt).await);
    }

    #[tokio::test]
    async fn injected_poll_failure_hits_only_that_poll() {
        let queue = InMemoryQueue::new();
        let id = queue.ensure_queue("orders").await.unwrap();
        queue.fail_receive_on_poll(2).await;

        assert!(queue.receive(&id, 10, WAIT).await.is_ok());
        assert!(matches!(
            queue.receive(&id, 10, WAIT).await,
            Err(TransientError::Receive { .. })
        ));
        assert!(queue.receive(&id, 10, WAIT).await.is_ok());
    }

    #[tokio::test]
    async fn store_outage_rejects_puts() {
        let store = InMemoryStore::new();
        let bucket = store.ensure_bucket("archive").await.unwrap();
        store.set_available(false).await;

        let result = store.put(&bucket, "k", b"[]".to_vec()).await;

        assert!(matches!(result, Err(TransientError::Put { .. })));
        assert!(store.keys(&bucket).await.is_empty());
    }

    #[tokio::test]
    async fn put_into_missing_bucket_fails() {
        let store = InMemoryStore::new();
        let result = store.put(&BucketId::new("nope"), "k", Vec::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn put_then_get_returns_bytes() {
        let store = InMemoryStore::new();
        let bucket = store.ensure_bucket("archive").await.unwrap();

        store.put(&bucket, "b.json", b"[1]".to_vec()).await.unwrap();
        store.put(&bucket, "a.json", b"[2]".to_vec()).await.unwrap();

        assert_eq!(store.get(&bucket, "b.json").await.unwrap(), b"[1]");
        assert_eq!(store.keys(&bucket).await, ["a.json", "b.json"]);
    }
}
