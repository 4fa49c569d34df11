//! Configuration types for queue-archiver

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Largest batch a single SQS receive call may return
pub const MAX_BATCH_SIZE: usize = 10;

/// Longest long-poll wait SQS accepts
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);

/// AWS connection settings
///
/// Credentials are optional: when either half is missing the SDK's default
/// provider chain is used instead of static keys.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region name (e.g. "eu-west-1"); SDK default when None
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint (LocalStack, MinIO); AWS default when None
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Static access key id
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret access key
    #[serde(default, skip_serializing)]
    pub secret_access_key: Option<String>,
}

impl std::fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Queue polling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name, created if absent (default: "aws-sqs-to-s3-etl-queue")
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Maximum messages per poll, 1..=10 (default: 10)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Long-poll wait per receive call (default: 10 seconds)
    #[serde(default = "default_wait_time", with = "duration_serde")]
    pub wait_time: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            batch_size: default_batch_size(),
            wait_time: default_wait_time(),
        }
    }
}

/// Object storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket name, created if absent (default: "aws-sqs-to-s3-etl-bucket")
    #[serde(default = "default_bucket_name")]
    pub bucket: String,

    /// Local directory artifacts are staged in before upload (default: "data")
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket_name(),
            staging_dir: default_staging_dir(),
        }
    }
}

/// Artifact naming and empty-batch policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// File name prefix (default: "users")
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Produce and upload an `[]` artifact when nothing was drained (default: true)
    ///
    /// When false the archiver is not invoked at all for an empty drain.
    #[serde(default = "default_true")]
    pub archive_empty_batches: bool,

    /// Append a random suffix to the timestamped name (default: true)
    ///
    /// Timestamps only have second resolution, so two runs within the same
    /// second would otherwise produce the same object key.
    #[serde(default = "default_true")]
    pub unique_names: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
            archive_empty_batches: true,
            unique_names: true,
        }
    }
}

/// Demo producer settings (seeds the queue with generated user records)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Seed the queue before each consumer run (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Lower bound on generated messages per run (default: 1)
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,

    /// Upper bound on generated messages per run (default: 10)
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_messages: default_min_messages(),
            max_messages: default_max_messages(),
        }
    }
}

/// Repetition settings for the binary
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Pause between runs; a single run is performed when None
    #[serde(default, with = "optional_duration_serde")]
    pub interval: Option<Duration>,
}

/// Main configuration
///
/// Every section has defaults, so `Config::default()` is a working setup
/// against the default AWS credential chain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// AWS connection settings
    #[serde(default)]
    pub aws: AwsConfig,

    /// Queue polling settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Object storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Artifact naming and empty-batch policy
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Demo producer settings
    #[serde(default)]
    pub producer: ProducerConfig,

    /// Repetition settings
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load configuration from a `.env` file (if present) and the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// Unset variables keep their defaults; set but unparseable variables are
    /// reported as [`Error::Config`] naming the variable.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        config.aws.access_key_id = var("AWS_ACCESS_KEY_ID");
        config.aws.secret_access_key = var("AWS_SECRET_KEY").or_else(|| var("AWS_SECRET_ACCESS_KEY"));
        config.aws.region = var("REGION_NAME").or_else(|| var("AWS_REGION"));
        config.aws.endpoint_url = var("AWS_ENDPOINT_URL");

        if let Some(name) = var("QUEUE_NAME") {
            config.queue.name = name;
        }
        if let Some(raw) = var("BATCH_SIZE") {
            config.queue.batch_size = parse_var("BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = var("WAIT_TIME_SECONDS") {
            config.queue.wait_time = Duration::from_secs(parse_var("WAIT_TIME_SECONDS", &raw)?);
        }

        if let Some(bucket) = var("BUCKET_NAME") {
            config.storage.bucket = bucket;
        }
        if let Some(dir) = var("STAGING_DIR") {
            config.storage.staging_dir = PathBuf::from(dir);
        }

        if let Some(prefix) = var("ARTIFACT_PREFIX") {
            config.archive.file_prefix = prefix;
        }
        if let Some(raw) = var("ARCHIVE_EMPTY_BATCHES") {
            config.archive.archive_empty_batches = parse_bool("ARCHIVE_EMPTY_BATCHES", &raw)?;
        }
        if let Some(raw) = var("UNIQUE_ARTIFACT_NAMES") {
            config.archive.unique_names = parse_bool("UNIQUE_ARTIFACT_NAMES", &raw)?;
        }

        if let Some(raw) = var("SEED_MESSAGES") {
            config.producer.enabled = parse_bool("SEED_MESSAGES", &raw)?;
        }
        if let Some(raw) = var("SEED_MIN") {
            config.producer.min_messages = parse_var("SEED_MIN", &raw)?;
        }
        if let Some(raw) = var("SEED_MAX") {
            config.producer.max_messages = parse_var("SEED_MAX", &raw)?;
        }

        if let Some(raw) = var("RUN_INTERVAL_SECONDS") {
            let secs: u64 = parse_var("RUN_INTERVAL_SECONDS", &raw)?;
            config.schedule.interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.queue.name.trim().is_empty() {
            return Err(Error::config("QUEUE_NAME", "queue name must not be empty"));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.queue.batch_size) {
            return Err(Error::config(
                "BATCH_SIZE",
                format!(
                    "batch size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                    self.queue.batch_size
                ),
            ));
        }
        if self.queue.wait_time > MAX_WAIT_TIME {
            return Err(Error::config(
                "WAIT_TIME_SECONDS",
                format!(
                    "wait time must be at most {} seconds, got {}",
                    MAX_WAIT_TIME.as_secs(),
                    self.queue.wait_time.as_secs()
                ),
            ));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(Error::config("BUCKET_NAME", "bucket name must not be empty"));
        }
        if self.archive.file_prefix.is_empty()
            || self.archive.file_prefix.contains(['/', '\\'])
        {
            return Err(Error::config(
                "ARTIFACT_PREFIX",
                "artifact prefix must be non-empty and contain no path separators",
            ));
        }
        if self.producer.min_messages > self.producer.max_messages {
            return Err(Error::config(
                "SEED_MIN",
                format!(
                    "seed minimum ({}) exceeds seed maximum ({})",
                    self.producer.min_messages, self.producer.max_messages
                ),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::config(key, format!("invalid value {raw:?}: {e}")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(
            key,
            format!("invalid boolean {raw:?}, expected true/false"),
        )),
    }
}

// Default value functions
fn default_queue_name() -> String {
    "aws-sqs-to-s3-etl-queue".to_string()
}

fn default_bucket_name() -> String {
    "aws-sqs-to-s3-etl-bucket".to_string()
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_wait_time() -> Duration {
    Duration::from_secs(10)
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_file_prefix() -> String {
    "users".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_messages() -> usize {
    1
}

fn default_max_messages() -> usize {
    10
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
