//! File-based insight log, a flat UTF-8 file with one insight per line.
//!
//! Storage location: `insights.md` in the working directory unless configured
//! otherwise. The file and its parent directory are created on first write.
//! Nothing is ever truncated or rotated.

use async_trait::async_trait;
use deskpilot_core::error::InsightError;
use deskpilot_core::insight::{InsightStore, single_line};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// An append-only insight log backed by a plain text file.
pub struct FileInsightStore {
    path: PathBuf,
    /// Serializes appends from clones sharing this store behind an `Arc`.
    write_lock: Mutex<()>,
}

impl FileInsightStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl InsightStore for FileInsightStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, insight: &str) -> Result<(), InsightError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                InsightError::Storage(format!("Failed to create insight directory: {e}"))
            })?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                InsightError::Storage(format!(
                    "Failed to open insight log {}: {e}",
                    self.path.display()
                ))
            })?;

        let mut line = single_line(insight);
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| InsightError::Storage(format!("Failed to write insight: {e}")))?;
        file.flush()
            .await
            .map_err(|e| InsightError::Storage(format!("Failed to flush insight log: {e}")))?;

        debug!(path = %self.path.display(), "Insight appended");
        Ok(())
    }

    async fn read_all(&self) -> Result<String, InsightError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(InsightError::Storage(format!(
                "Failed to read insight log {}: {e}",
                self.path.display()
            ))),
        }
    }
}
