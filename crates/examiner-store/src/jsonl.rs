//! Append-only JSON-lines store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use examiner_core::error::PersistError;
use examiner_core::model::ResultRecord;
use examiner_core::traits::ResultPersister;

/// Writes one JSON object per line. Writes from one process are serialized.
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored record, oldest first. A missing file is an empty
    /// store; unreadable lines are skipped.
    pub async fn load_all(&self) -> Result<Vec<ResultRecord>, PersistError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ResultRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping unreadable result line"
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl ResultPersister for JsonlStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn persist(&self, record: &ResultRecord) -> Result<(), PersistError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_record;

    #[tokio::test]
    async fn appends_and_loads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::new(dir.path().join("nested").join("results.jsonl"));

        let first = sample_record("GC-24015", "7/10");
        let second = sample_record("GC-24016", "10/10");
        store.persist(&first).await.unwrap();
        store.persist(&second).await.unwrap();

        let records = store.load_all().await.unwrap();
        assert_eq!(records, vec![first, second]);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::new(dir.path().join("none.jsonl"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let record = sample_record("GC-24015", "3/5");
        std::fs::write(
            &path,
            format!("{{not json\n\n{}\n", serde_json::to_string(&record).unwrap()),
        )
        .unwrap();

        let records = JsonlStore::new(&path).load_all().await.unwrap();
        assert_eq!(records, vec![record]);
    }

    #[tokio::test]
    async fn unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let store = JsonlStore::new(dir.path());
        let err = store
            .persist(&sample_record("GC-24015", "1/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::Io(_)));
    }
}
