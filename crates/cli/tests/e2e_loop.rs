//! End-to-end tests for the DeskPilot sampling loop.
//!
//! These drive the full pipeline with a scripted model: real shell and
//! editor tools, the file-backed insight log, image pruning and observers.

use std::path::Path;
use std::sync::{Arc, Mutex};

use deskpilot_agent::pruner::count_tool_result_images;
use deskpilot_agent::{FnObserver, NoopObserver, SamplingLoop};
use deskpilot_core::error::ProviderError;
use deskpilot_core::message::{ContentBlock, Conversation, Message, ToolResultContent};
use deskpilot_core::provider::{Provider, ProviderRequest, RawResponse};
use deskpilot_core::tool::{Tool, ToolCollection, ToolParam, ToolResult};
use deskpilot_memory::FileInsightStore;
use deskpilot_tools::{BashTool, EditTool};
use serde_json::json;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted responses in sequence and records every request.
struct ScriptedProvider {
    turns: Vec<Vec<ContentBlock>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<Vec<ContentBlock>>) -> Self {
        Self {
            turns,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<RawResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let call = requests.len();
        let Some(blocks) = self.turns.get(call) else {
            panic!(
                "ScriptedProvider exhausted: call #{call}, have {}",
                self.turns.len()
            );
        };
        requests.push(request);
        Ok(RawResponse::from_content(&format!("msg_{call}"), "mock", blocks))
    }
}

/// Stands in for the computer tool: every call returns a screenshot.
struct ScreenshotTool;

#[async_trait::async_trait]
impl Tool for ScreenshotTool {
    fn name(&self) -> &str {
        "computer"
    }

    fn to_param(&self) -> ToolParam {
        ToolParam::Native {
            kind: "computer_20241022".into(),
            name: "computer".into(),
            options: serde_json::Map::new(),
        }
    }

    async fn execute(
        &self,
        _input: serde_json::Value,
    ) -> Result<ToolResult, deskpilot_core::error::ToolError> {
        Ok(ToolResult::default().with_image("iVBORw0KGgo="))
    }
}

fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.into(),
        name: name.into(),
        input,
    }
}

fn desktop_tools() -> Arc<ToolCollection> {
    Arc::new(
        ToolCollection::new()
            .with(Box::new(ScreenshotTool))
            .with(Box::new(BashTool::new()))
            .with(Box::new(EditTool::new())),
    )
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn tool_result_blocks(message: &Message) -> Vec<(String, bool, ToolResultContent)> {
    message
        .blocks()
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some((tool_use_id.clone(), *is_error, content.clone())),
            _ => None,
        })
        .collect()
}

// ── E2E: shell and editor ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_shell_and_editor_session() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    let insights_path = dir.path().join("insights.md");

    let provider = Arc::new(ScriptedProvider::new(vec![
        vec![
            ContentBlock::text("Let me check the shell first."),
            tool_use("t1", "bash", json!({"command": "echo hello"})),
        ],
        vec![tool_use(
            "t2",
            "str_replace_editor",
            json!({"command": "create", "path": path_str(&notes), "file_text": "alpha\n"}),
        )],
        vec![tool_use(
            "t3",
            "str_replace_editor",
            json!({"command": "str_replace", "path": path_str(&notes), "old_str": "alpha", "new_str": "beta"}),
        )],
        vec![ContentBlock::text("The notes now say beta.")],
    ]));

    let agent = SamplingLoop::new(
        provider.clone(),
        desktop_tools(),
        Arc::new(FileInsightStore::new(&insights_path)),
        "mock",
    )
    .with_insight_interval(3);

    let outputs = Arc::new(Mutex::new(Vec::new()));
    let texts = Arc::new(Mutex::new(Vec::new()));
    let observer = {
        let outputs = outputs.clone();
        let texts = texts.clone();
        FnObserver::new()
            .on_tool_result(move |result, id| {
                outputs
                    .lock()
                    .unwrap()
                    .push((id.to_string(), result.output_text().map(str::to_string)));
            })
            .on_content(move |block| {
                if let ContentBlock::Text { text } = block {
                    texts.lock().unwrap().push(text.clone());
                }
            })
    };

    let mut conv = Conversation::new();
    conv.push(Message::user("write beta into my notes"));
    let summary = agent.run(&mut conv, &observer).await.unwrap();

    assert_eq!(provider.calls(), 4);
    assert_eq!(summary.turns, 4);
    assert_eq!(summary.tool_invocations, 3);
    assert_eq!(summary.insights_written, 1);
    // user + 3 × (assistant, tool results) + final assistant
    assert_eq!(conv.len(), 8);

    assert_eq!(std::fs::read_to_string(&notes).unwrap(), "beta\n");

    let outputs = outputs.lock().unwrap();
    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs[0], ("t1".to_string(), Some("hello".to_string())));
    assert_eq!(
        texts.lock().unwrap().as_slice(),
        ["Let me check the shell first.", "The notes now say beta."]
    );

    let log = std::fs::read_to_string(&insights_path).unwrap();
    assert_eq!(
        log,
        "Command executed successfully. Review the output for further improvements.\n"
    );
}

#[tokio::test]
async fn e2e_tool_failures_do_not_end_the_run() {
    let dir = tempfile::tempdir().unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        vec![
            tool_use("t1", "bash", json!({"command": "echo broken 1>&2; exit 3"})),
            tool_use("t2", "mouse", json!({})),
            tool_use("t3", "str_replace_editor", json!({"command": "view", "path": "relative.txt"})),
        ],
        vec![ContentBlock::text("Nothing worked, giving up.")],
    ]));

    let agent = SamplingLoop::new(
        provider.clone(),
        desktop_tools(),
        Arc::new(FileInsightStore::new(dir.path().join("insights.md"))),
        "mock",
    );

    let mut conv = Conversation::new();
    conv.push(Message::user("try everything"));
    let summary = agent.run(&mut conv, &NoopObserver).await.unwrap();

    assert_eq!(summary.turns, 2);
    assert_eq!(summary.tool_invocations, 3);
    assert_eq!(conv.len(), 4);

    let results = tool_result_blocks(&conv.messages[2]);
    let ids: Vec<&str> = results.iter().map(|(id, _, _)| id.as_str()).collect();
    assert_eq!(ids, ["t1", "t2", "t3"]);
    assert!(results.iter().all(|(_, is_error, _)| *is_error));
    assert_eq!(results[0].2, ToolResultContent::Text("broken".into()));

    // The failures went out to the model on the second call.
    let second = &provider.requests()[1];
    assert_eq!(second.messages.len(), 3);
}

// ── E2E: insight log and system prompt ───────────────────────────────────

#[tokio::test]
async fn e2e_insights_feed_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let insights_path = dir.path().join("insights.md");
    std::fs::write(&insights_path, "The dock is hidden on this machine.\n").unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        vec![tool_use("t1", "bash", json!({"command": "true"}))],
        vec![ContentBlock::text("ok")],
        vec![ContentBlock::text("second run")],
    ]));

    let agent = SamplingLoop::new(
        provider.clone(),
        desktop_tools(),
        Arc::new(FileInsightStore::new(&insights_path)),
        "mock",
    )
    .with_base_prompt("BASE")
    .with_system_prompt_suffix("Be brief.")
    .with_insight_interval(1);

    let mut conv = Conversation::new();
    conv.push(Message::user("check something"));
    agent.run(&mut conv, &NoopObserver).await.unwrap();

    conv.push(Message::user("and again"));
    agent.run(&mut conv, &NoopObserver).await.unwrap();

    let requests = provider.requests();
    assert_eq!(
        requests[0].system,
        "BASE\n<PREPROMPT_INSIGHTS>\nThe dock is hidden on this machine.\n\n</PREPROMPT_INSIGHTS> Be brief."
    );
    // Both turns of the first run share the prompt read at its start.
    assert_eq!(requests[1].system, requests[0].system);
    // `true` prints nothing, so the fallback insight is recorded.
    assert!(requests[2].system.contains(
        "The dock is hidden on this machine.\nNo significant outcome. Consider revising the approach or inputs.\n"
    ));
}

// ── E2E: screenshot pruning ──────────────────────────────────────────────

#[tokio::test]
async fn e2e_old_screenshots_are_pruned() {
    let dir = tempfile::tempdir().unwrap();

    let mut turns: Vec<Vec<ContentBlock>> = (0..5)
        .map(|i| vec![tool_use(&format!("shot{i}"), "computer", json!({"action": "screenshot"}))])
        .collect();
    turns.push(vec![ContentBlock::text("Seen enough.")]);
    let provider = Arc::new(ScriptedProvider::new(turns));

    let agent = SamplingLoop::new(
        provider.clone(),
        desktop_tools(),
        Arc::new(FileInsightStore::new(dir.path().join("insights.md"))),
        "mock",
    )
    .with_image_limit(Some(2))
    .with_image_removal_batch(2);

    let mut conv = Conversation::new();
    conv.push(Message::user("look at the screen"));
    let summary = agent.run(&mut conv, &NoopObserver).await.unwrap();

    // Four images were present before the fifth call: two removed in one batch.
    assert_eq!(summary.images_pruned, 2);
    assert_eq!(count_tool_result_images(&conv.messages), 3);

    let requests = provider.requests();
    assert_eq!(count_tool_result_images(&requests[4].messages), 2);
    assert_eq!(count_tool_result_images(&requests[5].messages), 3);

    // Oldest screenshots go first.
    for turn in [2, 4] {
        let (_, _, content) = &tool_result_blocks(&conv.messages[turn])[0];
        assert_eq!(content, &ToolResultContent::Blocks(Vec::new()));
    }
}
