pub mod grades;
pub mod history;
pub mod init;
pub mod take;

use std::sync::Arc;

use examiner_core::traits::ResultPersister;
use examiner_providers::StoreConfig;
use examiner_store::{JsonlStore, MemoryStore, RestStore};

/// Open the configured result store.
pub fn open_store(config: &StoreConfig) -> Arc<dyn ResultPersister> {
    match config {
        StoreConfig::Jsonl { path } => Arc::new(JsonlStore::new(path)),
        StoreConfig::Rest {
            base_url,
            api_key,
            table,
        } => Arc::new(RestStore::new(base_url, api_key, table)),
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
    }
}
