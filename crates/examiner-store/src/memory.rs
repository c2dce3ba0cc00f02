//! In-memory store.

use async_trait::async_trait;
use tokio::sync::Mutex;

use examiner_core::error::PersistError;
use examiner_core::model::ResultRecord;
use examiner_core::traits::ResultPersister;

/// Keeps records for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ResultPersister for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn persist(&self, record: &ResultRecord) -> Result<(), PersistError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_record;

    #[tokio::test]
    async fn keeps_every_record() {
        let store = MemoryStore::new();
        store.persist(&sample_record("a", "1/2")).await.unwrap();
        store.persist(&sample_record("b", "2/2")).await.unwrap();

        let records = store.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].student_id, "b");
    }
}
