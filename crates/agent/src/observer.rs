//! Observation hooks for a sampling run.

use deskpilot_core::message::ContentBlock;
use deskpilot_core::provider::RawResponse;
use deskpilot_core::tool::ToolResult;

/// Receives everything the loop sees, as it sees it.
///
/// All methods default to doing nothing.
pub trait LoopObserver: Send + Sync {
    /// Called for every content block of a model response, in order.
    fn on_content(&self, _block: &ContentBlock) {}

    /// Called after each tool execution with the originating `tool_use` id.
    fn on_tool_result(&self, _result: &ToolResult, _tool_use_id: &str) {}

    /// Called with each raw model response before it is parsed.
    fn on_raw_response(&self, _response: &RawResponse) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl LoopObserver for NoopObserver {}

type ContentFn = Box<dyn Fn(&ContentBlock) + Send + Sync>;
type ToolResultFn = Box<dyn Fn(&ToolResult, &str) + Send + Sync>;
type RawResponseFn = Box<dyn Fn(&RawResponse) + Send + Sync>;

/// Observer assembled from closures.
#[derive(Default)]
pub struct FnObserver {
    content: Option<ContentFn>,
    tool_result: Option<ToolResultFn>,
    raw_response: Option<RawResponseFn>,
}

impl FnObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_content(mut self, f: impl Fn(&ContentBlock) + Send + Sync + 'static) -> Self {
        self.content = Some(Box::new(f));
        self
    }

    pub fn on_tool_result(mut self, f: impl Fn(&ToolResult, &str) + Send + Sync + 'static) -> Self {
        self.tool_result = Some(Box::new(f));
        self
    }

    pub fn on_raw_response(mut self, f: impl Fn(&RawResponse) + Send + Sync + 'static) -> Self {
        self.raw_response = Some(Box::new(f));
        self
    }
}

impl LoopObserver for FnObserver {
    fn on_content(&self, block: &ContentBlock) {
        if let Some(f) = &self.content {
            f(block);
        }
    }

    fn on_tool_result(&self, result: &ToolResult, tool_use_id: &str) {
        if let Some(f) = &self.tool_result {
            f(result, tool_use_id);
        }
    }

    fn on_raw_response(&self, response: &RawResponse) {
        if let Some(f) = &self.raw_response {
            f(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn closures_receive_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (seen.clone(), seen.clone());
        let observer = FnObserver::new()
            .on_content(move |block| a.lock().unwrap().push(format!("{block:?}")))
            .on_tool_result(move |_, id| b.lock().unwrap().push(id.to_string()));

        LoopObserver::on_content(&observer, &ContentBlock::text("hi"));
        LoopObserver::on_tool_result(&observer, &ToolResult::default(), "toolu_1");
        LoopObserver::on_raw_response(&observer, &RawResponse { status: 200, body: "{}".into() });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], "toolu_1");
    }
}
