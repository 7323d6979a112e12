//! The computer-use sampling loop.
//!
//! Each run follows a **call → act → report** cycle:
//!
//! 1. **Sweep** stale screenshots and read the insight log (once per run)
//! 2. **Prune** old screenshots from the conversation
//! 3. **Call** the model with the conversation, system prompt and tool schema
//! 4. **Act** on every `tool_use` block, collecting `tool_result` blocks
//! 5. **Report** the results back as one user turn and loop to step 2
//!
//! The run ends when the model answers without asking for a tool. Every few
//! tool actions an insight is appended to the log for future runs.

pub mod adapter;
pub mod insight;
pub mod janitor;
pub mod loop_runner;
pub mod observer;
pub mod prompt;
pub mod pruner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use adapter::make_tool_result;
pub use insight::{InsightGenerator, InsightRule, recent_user_inputs};
pub use janitor::{ScreenshotJanitor, ScreenshotStore, screenshot_file_name};
pub use loop_runner::{RunSummary, SamplingLoop};
pub use observer::{FnObserver, LoopObserver, NoopObserver};
pub use pruner::prune_images;
