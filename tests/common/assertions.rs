//! Custom test assertions for consumer runs

use queue_archiver::consumer::archive::decode_artifact;
use queue_archiver::{BucketId, InMemoryStore, RunOutcome, RunReport};
use std::path::Path;

/// Decoded contents of the artifact a run published
///
/// Panics if the run did not publish or the object is missing.
pub async fn published_bodies(
    store: &InMemoryStore,
    bucket: &BucketId,
    report: &RunReport,
) -> Vec<String> {
    let RunOutcome::Published { key } = &report.outcome else {
        panic!("expected a published artifact, got {:?}", report.outcome);
    };
    let bytes = store
        .get(bucket, key)
        .await
        .unwrap_or_else(|| panic!("object {key} missing from bucket {bucket}"));
    decode_artifact(&bytes).expect("artifact is not a JSON array of strings")
}

/// Files currently in the staging directory (empty if it does not exist)
pub fn staged_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
