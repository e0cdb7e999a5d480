//! Snapshot codec for the memory backend.
//!
//! The document is `{"metrics": [...]}` with each entry in the metric JSON
//! shape. The file is rewritten in place; a torn write shows up as a decode
//! error on the next restore.

use crate::core::{Metric, Result, TallymanError};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotDocument {
    metrics: Vec<Metric>,
}

/// Serialize `metrics` to `path`, replacing any existing file.
pub async fn save(path: &Path, metrics: &[Metric]) -> Result<()> {
    #[derive(Serialize)]
    struct Borrowed<'a> {
        metrics: &'a [Metric],
    }

    let bytes = serde_json::to_vec(&Borrowed { metrics })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    // a reader sees either the previous document or the new one
    let staging = staging_path(path);
    tokio::fs::write(&staging, bytes).await?;
    tokio::fs::rename(&staging, path).await?;

    tracing::debug!(path = %path.display(), metrics = metrics.len(), "snapshot written");
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Decode the metric list stored at `path`.
///
/// Fails with [`TallymanError::SnapshotMissing`] or
/// [`TallymanError::SnapshotEmpty`] when there is no prior state.
pub async fn load(path: &Path) -> Result<Vec<Metric>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TallymanError::SnapshotMissing(path.to_path_buf()));
        },
        Err(e) => return Err(e.into()),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(TallymanError::SnapshotEmpty(path.to_path_buf()));
    }

    let document: SnapshotDocument = serde_json::from_slice(&bytes)?;
    Ok(document.metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics.json");
        let metrics = vec![Metric::counter("PollCount", 12), Metric::gauge("Alloc", 1024.5)];

        save(&path, &metrics).await.unwrap();
        assert_eq!(load(&path).await.unwrap(), metrics);
    }

    #[tokio::test]
    async fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        save(&path, &[Metric::counter("PollCount", 3)]).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, r#"{"metrics":[{"id":"PollCount","type":"counter","delta":3}]}"#);
    }

    #[tokio::test]
    async fn test_save_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");

        save(&path, &[Metric::counter("PollCount", 1)]).await.unwrap();
        save(&path, &[Metric::counter("PollCount", 2)]).await.unwrap();

        assert_eq!(load(&path).await.unwrap(), vec![Metric::counter("PollCount", 2)]);
        assert!(!staging_path(&path).exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        assert!(matches!(load(&path).await, Err(TallymanError::SnapshotMissing(_))));

        std::fs::write(&path, "").unwrap();
        assert!(matches!(load(&path).await, Err(TallymanError::SnapshotEmpty(_))));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, r#"{"metrics":[{"id":"a","type":"gau"#).unwrap();
        assert!(matches!(load(&path).await, Err(TallymanError::Serialization(_))));
    }
}
