//! Directory-backed record store.
//!
//! Layout: `<root>/<collection>/<id>.json`, one [`StoredRecord`] per file.

use async_trait::async_trait;
use chrono::Utc;
use ethica_core::Metadata;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{metadata_matches, ProviderError, RecordStore, StoredRecord};

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, ProviderError> {
        validate_name(collection)?;
        Ok(self.root.join(collection))
    }
}

/// Ids and collection names become path components.
fn validate_name(name: &str) -> Result<(), ProviderError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(ProviderError::InvalidId(name.to_string()))
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn store(
        &self,
        collection: &str,
        content: &Value,
        metadata: &Metadata,
        id: Option<&str>,
    ) -> Result<String, ProviderError> {
        let dir = self.collection_dir(collection)?;
        let id = match id {
            Some(id) => id.to_string(),
            None => format!("record_{}", Utc::now().format("%Y%m%d%H%M%S%f")),
        };
        validate_name(&id)?;

        tokio::fs::create_dir_all(&dir).await?;
        let record = StoredRecord {
            id: id.clone(),
            content: content.clone(),
            metadata: metadata.clone(),
        };
        let json = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(dir.join(format!("{}.json", id)), json).await?;

        tracing::debug!(collection, id = %id, "Record written");
        Ok(id)
    }

    async fn fetch_by_metadata(
        &self,
        collection: &str,
        filter: &Metadata,
    ) -> Result<Vec<StoredRecord>, ProviderError> {
        let dir = self.collection_dir(collection)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<StoredRecord>(&bytes) {
                Ok(record) if metadata_matches(&record.metadata, filter) => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                }
            }
        }

        // read_dir order is platform dependent
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    fn name(&self) -> &str {
        "file"
    }
}
