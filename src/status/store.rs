//! File-backed snapshot store.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use super::models::*;

/// Snapshot storage error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads the previous snapshot and persists the new one.
///
/// The snapshot lives at `state_path`; copies of it and of the run summary
/// are published into `public_dir`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    state_path: PathBuf,
    public_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(state_path: impl Into<PathBuf>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            public_dir: public_dir.into(),
        }
    }

    /// Load the previous snapshot, or an empty one if none was ever written.
    pub async fn load(&self, now: DateTime<Utc>) -> Result<Snapshot, StoreError> {
        let data = match fs::read(&self.state_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No previous status at {}, starting fresh", self.state_path.display());
                return Ok(Snapshot::empty(now));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.state_path.clone(),
                    source,
                })
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&data)?;
        Ok(snapshot)
    }

    /// Write the snapshot and publish it with the summary.
    pub async fn persist(&self, snapshot: &Snapshot, summary: &Summary) -> Result<(), StoreError> {
        let status = serde_json::to_vec(snapshot)?;
        let summary = serde_json::to_vec(summary)?;

        write(&self.state_path, &status).await?;

        fs::create_dir_all(&self.public_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.public_dir.clone(),
                source,
            })?;

        write(&self.public_dir.join("status.json"), &status).await?;
        write(&self.public_dir.join("summary.json"), &summary).await?;

        Ok(())
    }
}

/// Write `data` to a sibling temp file, then rename it over `path`.
async fn write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    fs::write(&temp_path, data)
        .await
        .map_err(|source| StoreError::Io {
            path: temp_path.clone(),
            source,
        })?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}
