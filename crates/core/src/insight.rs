//! Insight log trait: the append-only notes the agent leaves for itself.
//!
//! Every few tool actions the loop derives a one-sentence heuristic note and
//! appends it here. The whole log is read back at the start of each run and
//! embedded in the system prompt. Entries are newline-delimited; nothing is
//! ever rewritten or truncated.

use async_trait::async_trait;
use crate::error::InsightError;

#[async_trait]
pub trait InsightStore: Send + Sync {
    /// A short name for logs (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Append one entry. The store flattens it with [`single_line`] and
    /// adds the trailing newline.
    async fn append(&self, insight: &str) -> Result<(), InsightError>;

    /// The full log, verbatim. Empty if nothing was written yet.
    async fn read_all(&self) -> Result<String, InsightError>;
}

/// Collapse an entry onto one line: interior line breaks become a single
/// space and blank lines are dropped.
pub fn single_line(insight: &str) -> String {
    insight
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
