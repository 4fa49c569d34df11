//! Drain loop: poll until the queue reports empty, recording and deleting as we go.

use crate::clients::QueueClient;
use crate::types::{Batch, QueueId};
use std::time::Duration;

/// Poll parameters for one drain cycle
#[derive(Clone, Copy, Debug)]
pub struct DrainSettings {
    /// Maximum messages per receive call
    pub batch_size: usize,
    /// Long-poll wait per receive call
    pub wait_time: Duration,
}

/// What a drain cycle collected
#[derive(Debug, Default)]
pub struct DrainOutcome {
    /// Bodies in the order they were received
    pub batch: Batch,
    /// Receive calls issued, including the final empty or failed one
    pub polls: usize,
    /// Messages removed from the queue
    pub deleted: usize,
    /// Messages whose delete failed
    pub delete_failures: usize,
    /// Whether the cycle ended on a failed poll rather than an empty one
    pub poll_failed: bool,
}

/// Poll `queue` until a receive returns nothing, accumulating bodies
///
/// Each body is appended to the batch before its delete is issued. The delete
/// does not wait for the batch to be archived, so anything that stops the
/// process between here and a successful upload loses those messages.
///
/// A failed poll ends the cycle as if the queue were empty; bodies collected
/// so far are kept. A failed delete is logged and skipped: the body stays in
/// the batch and the message stays in the queue, so it can be delivered again
/// in a later cycle.
pub async fn drain(
    queue: &dyn QueueClient,
    queue_id: &QueueId,
    settings: DrainSettings,
) -> DrainOutcome {
    let mut outcome = DrainOutcome::default();

    loop {
        outcome.polls += 1;
        let messages = match queue
            .receive(queue_id, settings.batch_size, settings.wait_time)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(queue = %queue_id, error = %e, "Error receiving messages");
                outcome.poll_failed = true;
                break;
            }
        };

        if messages.is_empty() {
            tracing::info!(queue = %queue_id, "No messages in queue");
            break;
        }

        tracing::info!(
            queue = %queue_id,
            count = messages.len(),
            poll = outcome.polls,
            "Received messages"
        );

        for message in messages {
            outcome.batch.push(message.body);

            match queue.delete(queue_id, &message.receipt).await {
                Ok(()) => {
                    outcome.deleted += 1;
                    tracing::debug!(receipt = message.receipt.as_str(), "Deleted message");
                }
                Err(e) => {
                    outcome.delete_failures += 1;
                    tracing::warn!(
                        queue = %queue_id,
                        error = %e,
                        "Error deleting message, it may be delivered again"
                    );
                }
            }
        }
    }

    outcome
}
