//! Image-history pruning.
//!
//! Screenshots lose value as the conversation moves on but dominate its size.
//! Old images inside `tool_result` blocks are dropped oldest-first, in whole
//! batches, so the conversation prefix only changes once per batch.

use deskpilot_core::message::{ContentBlock, Message, MessageContent, ToolResultContent};

/// Images are removed in multiples of this many by default.
pub const DEFAULT_REMOVAL_BATCH: usize = 10;

/// Number of images nested in `tool_result` content lists.
pub fn count_tool_result_images(messages: &[Message]) -> usize {
    messages
        .iter()
        .flat_map(|m| m.blocks())
        .map(|block| match block {
            ContentBlock::ToolResult {
                content: ToolResultContent::Blocks(items),
                ..
            } => items.iter().filter(|i| i.is_image()).count(),
            _ => 0,
        })
        .sum()
}

/// Drop the oldest tool-result images so at most `keep` remain, rounded so
/// that a multiple of `batch` is removed. Returns how many were removed.
///
/// Standalone image blocks (e.g. pasted by the user) are never touched.
/// `None` leaves the conversation unchanged.
pub fn prune_images(messages: &mut [Message], keep: Option<usize>, batch: usize) -> usize {
    let Some(keep) = keep else {
        return 0;
    };

    let total = count_tool_result_images(messages);
    let excess = total.saturating_sub(keep);
    let to_remove = excess - excess % batch.max(1);
    if to_remove == 0 {
        return 0;
    }

    let mut remaining = to_remove;
    for message in messages.iter_mut() {
        let MessageContent::Blocks(blocks) = &mut message.content else {
            continue;
        };
        for block in blocks.iter_mut() {
            let ContentBlock::ToolResult {
                content: ToolResultContent::Blocks(items),
                ..
            } = block
            else {
                continue;
            };
            items.retain(|item| {
                if remaining > 0 && item.is_image() {
                    remaining -= 1;
                    false
                } else {
                    true
                }
            });
        }
        if remaining == 0 {
            break;
        }
    }

    to_remove
}
