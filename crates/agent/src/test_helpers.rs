//! Shared test doubles for sampling-loop tests.

use async_trait::async_trait;
use deskpilot_core::error::{ProviderError, ToolError};
use deskpilot_core::message::ContentBlock;
use deskpilot_core::provider::{Provider, ProviderRequest, RawResponse};
use deskpilot_core::tool::{Tool, ToolParam, ToolResult};
use std::sync::Mutex;

/// A provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<RawResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<RawResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// One response per turn, each built from content blocks.
    pub fn turns(turns: Vec<Vec<ContentBlock>>) -> Self {
        Self::new(
            turns
                .iter()
                .enumerate()
                .map(|(i, blocks)| Ok(RawResponse::from_content(&format!("msg_{i}"), "mock-model", blocks)))
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<RawResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let call = requests.len();
        if call >= responses.len() {
            panic!(
                "ScriptedProvider: no more responses (call #{call}, have {})",
                responses.len()
            );
        }
        requests.push(request);
        responses[call].clone()
    }
}

/// A `tool_use` block.
pub fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.into(),
        name: name.into(),
        input,
    }
}

/// A tool that returns a fixed result.
pub struct FixedTool {
    pub name: &'static str,
    pub result: ToolResult,
}

#[async_trait]
impl Tool for FixedTool {
    fn name(&self) -> &str {
        self.name
    }

    fn to_param(&self) -> ToolParam {
        ToolParam::Custom {
            name: self.name.into(),
            description: "Returns a fixed result".into(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(self.result.clone())
    }
}

/// A tool that always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn to_param(&self) -> ToolParam {
        ToolParam::Custom {
            name: "broken".into(),
            description: "Always fails".into(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolResult, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "broken".into(),
            reason: "device unplugged".into(),
        })
    }
}

/// A tool that panics while executing.
pub struct PanickyTool;

#[async_trait]
impl Tool for PanickyTool {
    fn name(&self) -> &str {
        "panicky"
    }

    fn to_param(&self) -> ToolParam {
        ToolParam::Custom {
            name: "panicky".into(),
            description: "Panics on every call".into(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolResult, ToolError> {
        let displays: Vec<u32> = Vec::new();
        let first = displays[0];
        Ok(ToolResult::from_output(first.to_string()))
    }
}
