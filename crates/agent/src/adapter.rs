//! Converts tool outcomes into `tool_result` blocks for the model API.

use deskpilot_core::message::{ContentBlock, ToolResultContent};
use deskpilot_core::tool::ToolResult;

/// Build the `tool_result` block answering `tool_use_id`.
///
/// Errors become a bare string with `is_error` set. Otherwise the content is
/// a list: the output text (if any), then the screenshot (if any).
pub fn make_tool_result(result: &ToolResult, tool_use_id: &str) -> ContentBlock {
    let (content, is_error) = match result.error_text() {
        Some(error) => (
            ToolResultContent::Text(with_system_prefix(result, error)),
            true,
        ),
        None => {
            let mut items = Vec::new();
            if let Some(output) = result.output_text() {
                items.push(ContentBlock::text(with_system_prefix(result, output)));
            }
            if let Some(image) = result.image() {
                items.push(ContentBlock::png(image));
            }
            (ToolResultContent::Blocks(items), false)
        }
    };

    ContentBlock::ToolResult {
        tool_use_id: tool_use_id.to_string(),
        content,
        is_error,
    }
}

fn with_system_prefix(result: &ToolResult, text: &str) -> String {
    match result.system_text() {
        Some(system) => format!("<system>{system}</system>\n{text}"),
        None => text.to_string(),
    }
}
