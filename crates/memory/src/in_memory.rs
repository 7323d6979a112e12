//! In-memory insight log: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use deskpilot_core::error::InsightError;
use deskpilot_core::insight::{InsightStore, single_line};
use std::sync::Arc;
use tokio::sync::RwLock;

/// An insight log held in a `String`.
#[derive(Clone)]
pub struct InMemoryInsightStore {
    log: Arc<RwLock<String>>,
}

impl InMemoryInsightStore {
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(String::new())),
        }
    }

    /// Start from existing log content.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            log: Arc::new(RwLock::new(content.into())),
        }
    }

    /// Number of entries written so far.
    pub async fn len(&self) -> usize {
        self.log.read().await.lines().count()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }
}

impl Default for InMemoryInsightStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InsightStore for InMemoryInsightStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, insight: &str) -> Result<(), InsightError> {
        let mut log = self.log.write().await;
        log.push_str(&single_line(insight));
        log.push('\n');
        Ok(())
    }

    async fn read_all(&self) -> Result<String, InsightError> {
        Ok(self.log.read().await.clone())
    }
}
