//! SQS and S3 clients built on the AWS SDK

use super::{ObjectStore, QueueClient};
use crate::config::AwsConfig;
use crate::error::TransientError;
use crate::types::{BucketId, QueueId, ReceiptToken, ReceivedMessage};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use std::time::Duration;

/// Region in which S3 rejects an explicit location constraint
const DEFAULT_S3_REGION: &str = "us-east-1";

/// Provider name reported for static credentials
const CREDENTIALS_PROVIDER: &str = "queue-archiver";

/// Build both clients from one shared SDK configuration
///
/// Static credentials are used when both key halves are configured, otherwise
/// the SDK's default provider chain applies. A custom endpoint switches S3 to
/// path-style addressing, which LocalStack and MinIO require.
pub async fn connect(config: &AwsConfig) -> (SqsQueue, S3Store) {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
        loader = loader.credentials_provider(aws_sdk_sqs::config::Credentials::new(
            key_id.clone(),
            secret.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        ));
    }
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint.clone());
    }

    let sdk_config = loader.load().await;
    let region = sdk_config.region().map(|r| r.as_ref().to_string());

    tracing::info!(
        region = region.as_deref().unwrap_or("default"),
        endpoint = config.endpoint_url.as_deref().unwrap_or("aws"),
        "AWS clients initialized"
    );

    let sqs = aws_sdk_sqs::Client::new(&sdk_config);
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();
    let s3 = aws_sdk_s3::Client::from_conf(s3_config);

    (SqsQueue::new(sqs), S3Store::new(s3, region))
}

/// Amazon SQS queue client
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
}

impl SqsQueue {
    /// Wrap an existing SDK client
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueClient for SqsQueue {
    async fn receive(
        &self,
        queue: &QueueId,
        max_count: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransientError> {
        let max_count = i32::try_from(max_count).unwrap_or(i32::MAX);
        let wait_secs = i32::try_from(wait.as_secs()).unwrap_or(i32::MAX);

        let output = self
            .client
            .receive_message()
            .queue_url(queue.as_str())
            .max_number_of_messages(max_count)
            .wait_time_seconds(wait_secs)
            .send()
            .await
            .map_err(|e| TransientError::Receive {
                queue: queue.to_string(),
                reason: aws_sdk_sqs::error::DisplayErrorContext(&e).to_string(),
            })?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| match (message.body, message.receipt_handle) {
                (Some(body), Some(receipt)) => Some(ReceivedMessage::new(body, receipt)),
                _ => {
                    tracing::warn!(
                        queue = %queue,
                        message_id = message.message_id.as_deref().unwrap_or("unknown"),
                        "Skipping message without body or receipt handle"
                    );
                    None
                }
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, queue: &QueueId, receipt: &ReceiptToken) -> Result<(), TransientError> {
        self.client
            .delete_message()
            .queue_url(queue.as_str())
            .receipt_handle(receipt.as_str())
            .send()
            .await
            .map_err(|e| TransientError::Delete {
                queue: queue.to_string(),
                reason: aws_sdk_sqs::error::DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn send(&self, queue: &QueueId, body: &str) -> Result<(), TransientError> {
        self.client
            .send_message()
            .queue_url(queue.as_str())
            .message_body(body)
            .send()
            .await
            .map_err(|e| TransientError::Send {
                queue: queue.to_string(),
                reason: aws_sdk_sqs::error::DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn ensure_queue(&self, name: &str) -> Result<QueueId, TransientError> {
        // CreateQueue returns the existing URL when attributes match
        let output = self
            .client
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| TransientError::Provision {
                resource: "queue",
                name: name.to_string(),
                reason: aws_sdk_sqs::error::DisplayErrorContext(&e).to_string(),
            })?;

        output
            .queue_url
            .map(QueueId)
            .ok_or_else(|| TransientError::Provision {
                resource: "queue",
                name: name.to_string(),
                reason: "CreateQueue response carried no queue URL".to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "sqs"
    }
}

/// Amazon S3 object store client
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    region: Option<String>,
}

impl S3Store {
    /// Wrap an existing SDK client
    ///
    /// `region` decides the location constraint used when creating buckets.
    pub fn new(client: aws_sdk_s3::Client, region: Option<String>) -> Self {
        Self { client, region }
    }

    fn location_constraint(&self) -> Option<CreateBucketConfiguration> {
        match self.region.as_deref() {
            None | Some(DEFAULT_S3_REGION) => None,
            Some(region) => Some(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, bucket: &BucketId, key: &str, bytes: Vec<u8>) -> Result<(), TransientError> {
        self.client
            .put_object()
            .bucket(bucket.as_str())
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| TransientError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn ensure_bucket(&self, name: &str) -> Result<BucketId, TransientError> {
        let result = self
            .client
            .create_bucket()
            .bucket(name)
            .set_create_bucket_configuration(self.location_constraint())
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(bucket = name, "Bucket created");
                Ok(BucketId::new(name))
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_bucket_already_owned_by_you()) =>
            {
                tracing::debug!(bucket = name, "Bucket already exists");
                Ok(BucketId::new(name))
            }
            Err(e) => Err(TransientError::Provision {
                resource: "bucket",
                name: name.to_string(),
                reason: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn s3_client() -> aws_sdk_s3::Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }

    #[test]
    fn no_location_constraint_in_default_region() {
        let store = S3Store::new(s3_client(), Some("us-east-1".to_string()));
        assert!(store.location_constraint().is_none());

        let store = S3Store::new(s3_client(), None);
        assert!(store.location_constraint().is_none());
    }

    #[test]
    fn location_constraint_follows_region() {
        let store = S3Store::new(s3_client(), Some("eu-west-1".to_string()));
        let constraint = store.location_constraint().unwrap();
        assert_eq!(
            constraint.location_constraint(),
            Some(&BucketLocationConstraint::EuWest1)
        );
    }
}
