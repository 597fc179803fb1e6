//! Process-local record store.

use async_trait::async_trait;
use ethica_core::Metadata;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{metadata_matches, ProviderError, RecordStore, StoredRecord};

/// Keeps records in memory, keyed by collection. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<BTreeMap<String, Vec<StoredRecord>>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn store(
        &self,
        collection: &str,
        content: &Value,
        metadata: &Metadata,
        id: Option<&str>,
    ) -> Result<String, ProviderError> {
        let id = match id {
            Some(id) if id.trim().is_empty() => return Err(ProviderError::InvalidId(id.to_string())),
            Some(id) => id.to_string(),
            None => format!("record_{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1),
        };

        let record = StoredRecord {
            id: id.clone(),
            content: content.clone(),
            metadata: metadata.clone(),
        };

        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        match records.iter_mut().find(|r| r.id == id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(id)
    }

    async fn fetch_by_metadata(
        &self,
        collection: &str,
        filter: &Metadata,
    ) -> Result<Vec<StoredRecord>, ProviderError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| metadata_matches(&r.metadata, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
