use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::fs;

use crate::error_handling::types::StorageError;
use crate::session_management::session::SessionTable;
use crate::storage::storage_trait::RecoveryStore;

/// Recovery snapshot kept as a single JSON object keyed by identity.
///
/// Saves go to a sibling `.tmp` file which is then renamed over the target, so
/// a crash mid-write leaves either the old or the new snapshot, never a torn one.
pub struct RecoveryFileStorage {
    path: PathBuf,
}

impl RecoveryFileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        info!("RecoveryFileStorage using {}", path.display());
        Self { path }
    }

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
}

#[async_trait]
impl RecoveryStore for RecoveryFileStorage {
    async fn load(&self) -> Result<Option<SessionTable>, StorageError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No recovery snapshot at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                error!("Read failed {}: {}", self.path.display(), e);
                return Err(StorageError::ReadFailed(e));
            }
        };

        let table: SessionTable = serde_json::from_slice(&content).map_err(|e| {
            error!("Invalid recovery snapshot {}: {}", self.path.display(), e);
            StorageError::Corrupt(e)
        })?;
        debug!(
            "Loaded {} sessions from {}",
            table.len(),
            self.path.display()
        );
        Ok(Some(table))
    }

    async fn save(&self, table: &SessionTable) -> Result<(), StorageError> {
        let content = serde_json::to_vec(table).map_err(StorageError::Corrupt)?;
        let temp = self.temp_path();

        fs::write(&temp, &content).await.map_err(|e| {
            error!("Write failed {}: {}", temp.display(), e);
            StorageError::WriteFailed(e)
        })?;
        fs::rename(&temp, &self.path).await.map_err(|e| {
            error!(
                "Rename failed {} -> {}: {}",
                temp.display(),
                self.path.display(),
                e
            );
            StorageError::WriteFailed(e)
        })?;

        debug!("Saved {} sessions to {}", table.len(), self.path.display());
        Ok(())
    }
}
