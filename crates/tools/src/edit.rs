//! File editor tool (`str_replace_editor`).
//!
//! Commands: `view`, `create`, `str_replace`, `insert`, `undo_edit`.
//! Paths must be absolute. Every mutation records the previous file content
//! so `undo_edit` can step back one edit at a time.

use async_trait::async_trait;
use deskpilot_core::error::ToolError;
use deskpilot_core::tool::{Tool, ToolParam, ToolResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::bash::truncate;

const TOOL_NAME: &str = "str_replace_editor";
const SNIPPET_LINES: usize = 4;

pub struct EditTool {
    history: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl EditTool {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(HashMap::new()),
        }
    }

    async fn view(&self, path: &Path, range: Option<(i64, i64)>) -> Result<ToolResult, ToolError> {
        if path.is_dir() {
            if range.is_some() {
                return Err(invalid(
                    "The `view_range` parameter is not allowed when `path` points to a directory.",
                ));
            }
            let mut entries = Vec::new();
            list_dir(path, 2, &mut entries).await?;
            entries.sort();
            return Ok(ToolResult::from_output(format!(
                "Here's the files and directories up to 2 levels deep in {}, excluding hidden items:\n{}\n",
                path.display(),
                entries.join("\n")
            )));
        }

        let content = read_file(path).await?;
        let lines: Vec<&str> = content.split('\n').collect();

        let (start, shown) = match range {
            None => (1, content.clone()),
            Some((start, end)) => {
                let total = lines.len() as i64;
                if start < 1 || start > total {
                    return Err(invalid(&format!(
                        "Invalid `view_range`: [{start}, {end}]. Its first element `{start}` should be within the range of lines of the file: [1, {total}]"
                    )));
                }
                if end != -1 && (end < start || end > total) {
                    return Err(invalid(&format!(
                        "Invalid `view_range`: [{start}, {end}]. Its second element `{end}` should be -1 or within [{start}, {total}]"
                    )));
                }
                let end = if end == -1 { total } else { end };
                (
                    start as usize,
                    lines[(start - 1) as usize..end as usize].join("\n"),
                )
            }
        };

        Ok(ToolResult::from_output(numbered(&shown, &path.display().to_string(), start)))
    }

    async fn create(&self, path: &Path, file_text: &str) -> Result<ToolResult, ToolError> {
        if path.exists() {
            return Err(invalid(&format!(
                "File already exists at: {}. Cannot overwrite files using command `create`.",
                path.display()
            )));
        }
        write_file(path, file_text).await?;
        self.remember(path, file_text.to_string()).await;
        Ok(ToolResult::from_output(format!(
            "File created successfully at: {}",
            path.display()
        )))
    }

    async fn str_replace(
        &self,
        path: &Path,
        old_str: &str,
        new_str: &str,
    ) -> Result<ToolResult, ToolError> {
        let content = read_file(path).await?;

        match content.matches(old_str).count() {
            0 => {
                return Err(invalid(&format!(
                    "No replacement was performed, old_str `{old_str}` did not appear verbatim in {}.",
                    path.display()
                )));
            }
            1 => {}
            _ => {
                let lines: Vec<String> = content
                    .split('\n')
                    .enumerate()
                    .filter(|(_, line)| line.contains(old_str))
                    .map(|(idx, _)| (idx + 1).to_string())
                    .collect();
                return Err(invalid(&format!(
                    "No replacement was performed. Multiple occurrences of old_str `{old_str}` in lines {}. Please ensure it is unique",
                    lines.join(", ")
                )));
            }
        }

        let new_content = content.replacen(old_str, new_str, 1);
        write_file(path, &new_content).await?;
        self.remember(path, content.clone()).await;

        let prefix = content.split(old_str).next().unwrap_or_default();
        let edit_line = prefix.matches('\n').count();
        let snippet_start = edit_line.saturating_sub(SNIPPET_LINES);
        let snippet_end = edit_line + SNIPPET_LINES + new_str.matches('\n').count();
        let snippet: Vec<&str> = new_content
            .split('\n')
            .skip(snippet_start)
            .take(snippet_end - snippet_start + 1)
            .collect();

        Ok(ToolResult::from_output(format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected. Edit the file again if necessary.",
            path.display(),
            numbered(
                &snippet.join("\n"),
                &format!("a snippet of {}", path.display()),
                snippet_start + 1
            )
        )))
    }

    async fn insert(
        &self,
        path: &Path,
        insert_line: usize,
        new_str: &str,
    ) -> Result<ToolResult, ToolError> {
        let content = read_file(path).await?;
        let mut lines: Vec<&str> = content.split('\n').collect();

        if insert_line > lines.len() {
            return Err(invalid(&format!(
                "Invalid `insert_line` parameter: {insert_line}. It should be within the range of lines of the file: [0, {}]",
                lines.len()
            )));
        }

        let new_lines: Vec<&str> = new_str.split('\n').collect();
        let inserted = new_lines.len();
        lines.splice(insert_line..insert_line, new_lines);
        let new_content = lines.join("\n");

        write_file(path, &new_content).await?;
        self.remember(path, content.clone()).await;

        let snippet_start = insert_line.saturating_sub(SNIPPET_LINES);
        let snippet: Vec<&str> = new_content
            .split('\n')
            .skip(snippet_start)
            .take(insert_line - snippet_start + inserted + SNIPPET_LINES)
            .collect();

        Ok(ToolResult::from_output(format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected (correct indentation, no duplicate lines, etc). Edit the file again if necessary.",
            path.display(),
            numbered(&snippet.join("\n"), "a snippet of the edited file", snippet_start + 1)
        )))
    }

    async fn undo_edit(&self, path: &Path) -> Result<ToolResult, ToolError> {
        let previous = {
            let mut history = self.history.lock().await;
            history.get_mut(path).and_then(|versions| versions.pop())
        };
        let previous = previous.ok_or_else(|| {
            invalid(&format!("No edit history found for {}.", path.display()))
        })?;

        write_file(path, &previous).await?;
        Ok(ToolResult::from_output(format!(
            "Last edit to {} undone successfully. {}",
            path.display(),
            numbered(&previous, &path.display().to_string(), 1)
        )))
    }

    async fn remember(&self, path: &Path, content: String) {
        self.history
            .lock()
            .await
            .entry(path.to_path_buf())
            .or_default()
            .push(content);
    }
}

impl Default for EditTool {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(message: &str) -> ToolError {
    ToolError::InvalidArguments(message.to_string())
}

fn io_error(path: &Path, e: std::io::Error) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL_NAME.into(),
        reason: format!("{}: {e}", path.display()),
    }
}

async fn read_file(path: &Path) -> Result<String, ToolError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error(path, e))
}

async fn write_file(path: &Path, content: &str) -> Result<(), ToolError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| io_error(path, e))
}

/// Render `content` the way `cat -n` does, starting at `first_line`.
fn numbered(content: &str, descriptor: &str, first_line: usize) -> String {
    let body: Vec<String> = truncate(content)
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:6}\t{line}", i + first_line))
        .collect();
    format!(
        "Here's the result of running `cat -n` on {descriptor}:\n{}\n",
        body.join("\n")
    )
}

/// Collect non-hidden entries under `dir`, up to `depth` levels deep.
async fn list_dir(dir: &Path, depth: usize, out: &mut Vec<String>) -> Result<(), ToolError> {
    let mut pending = vec![(dir.to_path_buf(), depth)];
    while let Some((current, remaining)) = pending.pop() {
        let mut reader = tokio::fs::read_dir(&current)
            .await
            .map_err(|e| io_error(&current, e))?;
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_error(&current, e))?
        {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            out.push(path.display().to_string());
            if remaining > 1 && path.is_dir() {
                pending.push((path, remaining - 1));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn to_param(&self) -> ToolParam {
        ToolParam::Native {
            kind: "text_editor_20241022".into(),
            name: TOOL_NAME.into(),
            options: serde_json::Map::new(),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = input["command"]
            .as_str()
            .ok_or_else(|| invalid("Missing 'command' argument"))?;
        let path = input["path"]
            .as_str()
            .ok_or_else(|| invalid("Missing 'path' argument"))?;
        let path = Path::new(path);

        if !path.is_absolute() {
            return Err(invalid(&format!(
                "The path {} is not an absolute path, it should start with `/`.",
                path.display()
            )));
        }
        if command != "create" && !path.exists() {
            return Err(invalid(&format!(
                "The path {} does not exist. Please provide a valid path.",
                path.display()
            )));
        }
        if command != "view" && path.is_dir() {
            return Err(invalid(&format!(
                "The path {} is a directory and only the `view` command can be used on directories",
                path.display()
            )));
        }

        debug!(command, path = %path.display(), "Running editor command");

        match command {
            "view" => {
                let range = match input.get("view_range") {
                    None | Some(serde_json::Value::Null) => None,
                    Some(value) => {
                        let pair = value
                            .as_array()
                            .filter(|a| a.len() == 2)
                            .and_then(|a| Some((a[0].as_i64()?, a[1].as_i64()?)))
                            .ok_or_else(|| {
                                invalid("Invalid `view_range`. It should be a list of two integers.")
                            })?;
                        Some(pair)
                    }
                };
                self.view(path, range).await
            }
            "create" => {
                let file_text = input["file_text"].as_str().ok_or_else(|| {
                    invalid("Parameter `file_text` is required for command: create")
                })?;
                self.create(path, file_text).await
            }
            "str_replace" => {
                let old_str = input["old_str"].as_str().ok_or_else(|| {
                    invalid("Parameter `old_str` is required for command: str_replace")
                })?;
                let new_str = input["new_str"].as_str().unwrap_or_default();
                self.str_replace(path, old_str, new_str).await
            }
            "insert" => {
                let insert_line = input["insert_line"].as_u64().ok_or_else(|| {
                    invalid("Parameter `insert_line` is required for command: insert")
                })?;
                let new_str = input["new_str"].as_str().ok_or_else(|| {
                    invalid("Parameter `new_str` is required for command: insert")
                })?;
                self.insert(path, insert_line as usize, new_str).await
            }
            "undo_edit" => self.undo_edit(path).await,
            other => Err(invalid(&format!(
                "Unrecognized command {other}. The allowed commands for the {TOOL_NAME} tool are: view, create, str_replace, insert, undo_edit"
            ))),
        }
    }
}
