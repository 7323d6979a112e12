//! Bash tool: run shell commands on the host.
//!
//! Each command runs in a fresh `sh -c` with a timeout. There is no
//! persistent session, so `restart` only acknowledges the request.

use async_trait::async_trait;
use deskpilot_core::error::ToolError;
use deskpilot_core::tool::{Tool, ToolParam, ToolResult};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_OUTPUT_CHARS: usize = 16_000;
const TRUNCATED_NOTE: &str = "<response clipped><NOTE>To save on context only part of this output has been shown to you.</NOTE>";

pub struct BashTool {
    timeout_secs: u64,
}

impl BashTool {
    pub fn new() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Clip long output so a single command cannot flood the context.
pub(crate) fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_OUTPUT_CHARS) {
        Some((idx, _)) => format!("{}{TRUNCATED_NOTE}", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn to_param(&self) -> ToolParam {
        ToolParam::Native {
            kind: "bash_20241022".into(),
            name: "bash".into(),
            options: serde_json::Map::new(),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult, ToolError> {
        if input["restart"].as_bool() == Some(true) {
            return Ok(ToolResult::default().with_system("tool has been restarted."));
        }

        let command = input["command"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("no command provided.".into()))?;

        debug!(command = %command, "Executing bash command");

        let child = Command::new("sh")
            .args(["-c", command])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), child)
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: "bash".into(),
                timeout_secs: self.timeout_secs,
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "bash".into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let text = if stderr.trim().is_empty() {
                stdout.trim_end().to_string()
            } else {
                format!("{}\n[stderr]: {}", stdout.trim_end(), stderr.trim_end())
            };
            Ok(ToolResult::from_output(truncate(&text)))
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            let error = if stderr.trim().is_empty() {
                format!("[exit code: {code}]")
            } else {
                truncate(stderr.trim_end())
            };
            Ok(ToolResult {
                output: Some(truncate(stdout.trim_end())).filter(|s| !s.is_empty()),
                error: Some(error),
                ..ToolResult::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_echo() {
        let result = BashTool::new()
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert_eq!(result.output_text(), Some("hello"));
        assert!(result.error_text().is_none());
    }

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let result = BashTool::new()
            .execute(serde_json::json!({"command": "echo oops 1>&2; exit 3"}))
            .await
            .unwrap();
        assert_eq!(result.error_text(), Some("oops"));
    }

    #[tokio::test]
    async fn silent_failure_reports_exit_code() {
        let result = BashTool::new()
            .execute(serde_json::json!({"command": "exit 7"}))
            .await
            .unwrap();
        assert_eq!(result.error_text(), Some("[exit code: 7]"));
    }

    #[tokio::test]
    async fn restart_is_acknowledged() {
        let result = BashTool::new()
            .execute(serde_json::json!({"restart": true}))
            .await
            .unwrap();
        assert_eq!(result.system_text(), Some("tool has been restarted."));
    }

    #[tokio::test]
    async fn missing_command_is_invalid() {
        let result = BashTool::new().execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let result = BashTool::new()
            .with_timeout(1)
            .execute(serde_json::json!({"command": "sleep 5"}))
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { timeout_secs: 1, .. })));
    }

    #[test]
    fn long_output_is_clipped() {
        let long = "x".repeat(MAX_OUTPUT_CHARS + 10);
        let clipped = truncate(&long);
        assert!(clipped.ends_with(TRUNCATED_NOTE));
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn advertises_native_type() {
        let param = BashTool::new().to_param();
        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(json, serde_json::json!({"type": "bash_20241022", "name": "bash"}));
    }
}
