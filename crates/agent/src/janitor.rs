//! Screenshot artifacts on disk.
//!
//! [`ScreenshotStore`] writes `screenshot_<tool_use_id>.png` files for tool
//! results that carry an image; [`ScreenshotJanitor`] deletes the ones older
//! than the retention window at the start of each run.

use base64::{Engine as _, engine::general_purpose};
use deskpilot_core::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Screenshot file name for a tool call.
pub fn screenshot_file_name(tool_use_id: &str) -> String {
    format!("screenshot_{tool_use_id}.png")
}

/// Deletes stale screenshot files.
#[derive(Debug, Clone)]
pub struct ScreenshotJanitor {
    dir: PathBuf,
    retention: Duration,
}

impl ScreenshotJanitor {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn with_retention_hours(dir: impl Into<PathBuf>, hours: u64) -> Self {
        Self::new(dir, Duration::from_secs(hours * 60 * 60))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete every regular file last modified before the retention window.
    ///
    /// A missing directory is a no-op. Failures are logged and skipped.
    /// Returns the number of files deleted.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(SystemTime::now()).await
    }

    async fn sweep_at(&self, now: SystemTime) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cannot scan screenshot directory");
                return 0;
            }
        };

        let mut deleted = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Screenshot directory scan interrupted");
                    break;
                }
            };

            let path = entry.path();
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= self.retention {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!(file = %path.display(), "Deleted old screenshot");
                    deleted += 1;
                }
                Err(e) => warn!(file = %path.display(), error = %e, "Failed to delete screenshot"),
            }
        }
        deleted
    }
}

/// Writes decoded screenshots into the screenshot directory.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Decode a base64 PNG and save it as `screenshot_<tool_use_id>.png`.
    ///
    /// Blocking: uses `std::fs` so it can be called from a synchronous
    /// [`LoopObserver`](crate::observer::LoopObserver) hook.
    pub fn save(&self, tool_use_id: &str, base64_png: &str) -> Result<PathBuf> {
        let bytes = general_purpose::STANDARD
            .decode(base64_png)
            .map_err(|e| Error::Internal(format!("invalid screenshot data: {e}")))?;

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Internal(format!("failed to create screenshot directory: {e}")))?;

        let path = self.dir.join(screenshot_file_name(tool_use_id));
        std::fs::write(&path, bytes)
            .map_err(|e| Error::Internal(format!("failed to write {}: {e}", path.display())))?;

        debug!(file = %path.display(), "Screenshot saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn age_file(path: &Path, age: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn deletes_only_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("screenshot_old.png");
        let fresh = dir.path().join("screenshot_fresh.png");
        std::fs::write(&old, b"old").unwrap();
        std::fs::write(&fresh, b"fresh").unwrap();
        age_file(&old, Duration::from_secs(5 * 60 * 60));
        age_file(&fresh, Duration::from_secs(60 * 60));

        let janitor = ScreenshotJanitor::with_retention_hours(dir.path(), 4);
        assert_eq!(janitor.sweep().await, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn subdirectories_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let janitor = ScreenshotJanitor::new(dir.path(), Duration::ZERO);
        let later = SystemTime::now() + Duration::from_secs(60);
        assert_eq!(janitor.sweep_at(later).await, 0);
        assert!(dir.path().join("nested").exists());
    }

    #[tokio::test]
    async fn missing_directory_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let janitor = ScreenshotJanitor::with_retention_hours(dir.path().join("absent"), 4);
        assert_eq!(janitor.sweep().await, 0);
    }

    #[test]
    fn store_decodes_and_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(dir.path().join("screenshots"));

        let path = store.save("toolu_42", "aGVsbG8=").unwrap();
        assert_eq!(path.file_name().unwrap(), "screenshot_toolu_42.png");
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn store_rejects_bad_base64() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(dir.path());
        assert!(store.save("t", "not base64!").is_err());
    }
}
