//! JSON file store.
//!
//! The record is written to a sibling temp file and renamed into place, so a
//! crash mid-write leaves either the old or the new record, never half of one.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use signalflip_domain::Position;

use crate::error::StoreError;
use crate::record::PositionRecord;
use crate::repository::PositionStore;

/// Position store backed by a single JSON file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl PositionStore for FileStore {
    async fn save(&self, position: &Position) -> Result<(), StoreError> {
        let record = PositionRecord::from(position);
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent.display().to_string(), e))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| StoreError::io(temp.display().to_string(), e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StoreError::io(self.display(), e))?;

        debug!(path = %self.display(), %position, "State saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<Position>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.display(), "No state file");
                return Ok(None);
            },
            Err(e) => return Err(StoreError::io(self.display(), e)),
        };

        let record: PositionRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.display(), error = %e, "State file unreadable, treating as absent");
                return Ok(None);
            },
        };

        match Position::try_from(record) {
            Ok(position) => Ok(Some(position)),
            Err(e) => {
                warn!(path = %self.display(), error = %e, "State file corrupt, treating as absent");
                Ok(None)
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
