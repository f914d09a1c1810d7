//! Play history as JSON lines
//!
//! One `{"track_id": ..., "played_at": ...}` object per line, appended as
//! tracks start. The engine calls [`PlayRecorder::record_play`] on its
//! worker runtime, so writes go through `tokio::fs`.

use aria_core::{AriaError, PlayRecorder, TrackId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A single history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayEntry {
    pub track_id: String,
    pub played_at: DateTime<Utc>,
}

/// Append-only play log
pub struct JsonlPlayLog {
    path: PathBuf,
    /// Serializes appends from concurrent record tasks
    write_lock: Mutex<()>,
}

impl JsonlPlayLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry, skipping lines that do not parse
    pub async fn entries(&self) -> aria_core::Result<Vec<PlayEntry>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AriaError::persistence(e.to_string())),
        };

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed history line");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl PlayRecorder for JsonlPlayLog {
    async fn record_play(&self, track_id: &TrackId) -> aria_core::Result<()> {
        let entry = PlayEntry {
            track_id: track_id.to_string(),
            played_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AriaError::persistence(format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AriaError::persistence(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| AriaError::persistence(e.to_string()))?;

        tracing::debug!(track_id = %track_id, "Play recorded");
        Ok(())
    }
}
