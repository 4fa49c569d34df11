//! Producer path: single-message send and generated user records for seeding a queue

use crate::clients::QueueClient;
use crate::error::TransientError;
use crate::types::QueueId;
use chrono::NaiveDate;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Dennis", "Edsger", "Frances", "Grace", "Ivan", "John", "Katherine",
    "Linus", "Margaret", "Niklaus", "Radia", "Tim", "Zoë",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Backus", "Cerf", "Dijkstra", "Hamilton", "Hopper", "Johnson", "Kahn", "Knuth",
    "Lamport", "Liskov", "Lovelace", "Perlman", "Ritchie", "Turing", "Wirth",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

/// Sample record used to seed a queue with realistic-looking bodies
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Email address derived from the name
    pub email: String,
    /// Calendar date, `YYYY-MM-DD`
    pub created_at: String,
}

impl UserRecord {
    /// Generate a random user
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Ada");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("Lovelace");
        let domain = EMAIL_DOMAINS.choose(rng).copied().unwrap_or("example.com");
        let number: u16 = rng.gen_range(1..1000);

        Self {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!(
                "{}.{}{}@{}",
                first.to_lowercase(),
                last.to_lowercase(),
                number,
                domain
            ),
            created_at: random_date(rng).format("%Y-%m-%d").to_string(),
        }
    }

    /// JSON message body for this record
    pub fn to_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn random_date<R: Rng + ?Sized>(rng: &mut R) -> NaiveDate {
    // 1970-01-01 through 2025-12-31
    let days = rng.gen_range(0..=20_453);
    NaiveDate::default() + chrono::Days::new(days)
}

/// Send one message body to the queue
pub async fn send_message(
    queue: &dyn QueueClient,
    queue_id: &QueueId,
    body: &str,
) -> Result<(), TransientError> {
    match queue.send(queue_id, body).await {
        Ok(()) => {
            tracing::info!(queue = %queue_id, "Message sent to queue successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!(queue = %queue_id, error = %e, "Error sending message");
            Err(e)
        }
    }
}

/// Send `count` generated users, returning how many the queue accepted
///
/// Individual send failures are logged and skipped.
pub async fn seed_queue(queue: &dyn QueueClient, queue_id: &QueueId, count: usize) -> usize {
    let records: Vec<UserRecord> = {
        let mut rng = rand::thread_rng();
        (0..count).map(|_| UserRecord::generate(&mut rng)).collect()
    };

    let mut sent = 0;
    for record in records {
        let body = match record.to_body() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode generated user");
                continue;
            }
        };
        if send_message(queue, queue_id, &body).await.is_ok() {
            sent += 1;
        }
    }

    tracing::info!(queue = %queue_id, requested = count, sent, "Seeded queue");
    sent
}
