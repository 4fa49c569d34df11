//! Batch archiver: serialize a drained batch to a staged JSON file and publish it.
//!
//! Artifacts are UTF-8 JSON arrays of strings, pretty-printed with a 4-space
//! indent and non-ASCII left unescaped. They are named
//! `{prefix}_{YYYYMMDD}_{HHMMSS}[_{suffix}].json` and uploaded under their base
//! file name.

use crate::clients::ObjectStore;
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::types::{Batch, BucketId, StagedArtifact};
use chrono::{Local, NaiveDateTime};
use rand::Rng;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Artifact file extension
const ARTIFACT_EXTENSION: &str = "json";

/// Indent used when pretty-printing artifacts
const ARTIFACT_INDENT: &[u8] = b"    ";

/// Fresh names tried before giving up on a colliding staged file
const MAX_NAME_ATTEMPTS: usize = 3;

/// Build an artifact file name for the given local time
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use queue_archiver::consumer::archive::artifact_name;
///
/// let at = NaiveDate::from_ymd_opt(2024, 3, 9)
///     .unwrap()
///     .and_hms_opt(7, 5, 1)
///     .unwrap();
/// assert_eq!(artifact_name("users", at, None), "users_20240309_070501.json");
/// assert_eq!(
///     artifact_name("users", at, Some("0a1b2c")),
///     "users_20240309_070501_0a1b2c.json"
/// );
/// ```
#[must_use]
pub fn artifact_name(prefix: &str, at: NaiveDateTime, suffix: Option<&str>) -> String {
    let timestamp = at.format("%Y%m%d_%H%M%S");
    match suffix {
        Some(suffix) => format!("{prefix}_{timestamp}_{suffix}.{ARTIFACT_EXTENSION}"),
        None => format!("{prefix}_{timestamp}.{ARTIFACT_EXTENSION}"),
    }
}

/// Serialize bodies as a pretty-printed JSON array of strings
pub fn encode_batch(bodies: &[String]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(ARTIFACT_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    bodies.serialize(&mut serializer)?;
    Ok(buf)
}

/// Decode artifact bytes back into the ordered bodies
pub fn decode_artifact(bytes: &[u8]) -> Result<Vec<String>> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write `bytes` to a freshly created staged file
///
/// A failed write removes the file, so a truncated artifact is never left
/// next to complete orphans.
async fn write_staged<W>(mut file: W, path: &Path, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(bytes).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    let Err(e) = written else {
        return Ok(());
    };
    drop(file);

    tracing::error!(path = %path.display(), error = %e, "Failed to write staged artifact");
    if let Err(remove_err) = tokio::fs::remove_file(path).await {
        tracing::warn!(
            path = %path.display(),
            error = %remove_err,
            "Failed to remove partially written artifact"
        );
    }
    Err(e.into())
}

fn random_suffix() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("{value:06x}")
}

/// Stages batches locally and hands them to the object store
#[derive(Clone, Debug)]
pub struct Archiver {
    staging_dir: PathBuf,
    prefix: String,
    unique_names: bool,
}

impl Archiver {
    /// Create an archiver writing into `staging_dir`
    pub fn new(staging_dir: impl Into<PathBuf>, config: &ArchiveConfig) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            prefix: config.file_prefix.clone(),
            unique_names: config.unique_names,
        }
    }

    /// Directory staged artifacts are written to
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    fn next_name(&self) -> String {
        let now = Local::now().naive_local();
        let suffix = self.unique_names.then(random_suffix);
        artifact_name(&self.prefix, now, suffix.as_deref())
    }

    /// Write the batch to a new file in the staging directory
    ///
    /// The directory is created if absent. An existing file is never
    /// overwritten: it may be an orphan from an earlier failed publish.
    pub async fn stage(&self, batch: &Batch) -> Result<StagedArtifact> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let bytes = encode_batch(batch.bodies())?;

        let attempts = if self.unique_names { MAX_NAME_ATTEMPTS } else { 1 };
        let mut last_err = None;

        for _ in 0..attempts {
            let key = self.next_name();
            let path = self.staging_dir.join(&key);

            let file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!(path = %path.display(), "Staged artifact name already taken");
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            write_staged(file, &path, &bytes).await?;

            tracing::info!(
                file = %key,
                count = batch.len(),
                "File created successfully"
            );

            return Ok(StagedArtifact {
                path,
                key,
                count: batch.len(),
            });
        }

        Err(last_err
            .map(Error::Io)
            .unwrap_or_else(|| Error::Other("no artifact name available".to_string())))
    }

    /// Upload a staged artifact under its key, then remove the local copy
    ///
    /// On upload failure the local file is left in place and the error is
    /// returned; there is no retry.
    pub async fn publish(
        &self,
        artifact: &StagedArtifact,
        store: &dyn ObjectStore,
        bucket: &BucketId,
    ) -> Result<()> {
        let bytes = tokio::fs::read(&artifact.path)
            .await
            .map_err(|e| Error::StagedArtifact {
                path: artifact.path.clone(),
                reason: e.to_string(),
            })?;

        store.put(bucket, &artifact.key, bytes).await?;

        tracing::info!(
            file = %artifact.path.display(),
            bucket = %bucket,
            key = %artifact.key,
            "Artifact uploaded successfully"
        );

        if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
            tracing::warn!(
                file = %artifact.path.display(),
                error = %e,
                "Failed to remove staged artifact after upload"
            );
        }

        Ok(())
    }
}
