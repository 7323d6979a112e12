//! Insight log stores for DeskPilot.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileInsightStore;
pub use in_memory::InMemoryInsightStore;
