//! Computer-use tool implementations for DeskPilot.
//!
//! Tools give the agent the ability to act on a macOS desktop:
//! take screenshots and drive the mouse and keyboard, run shell commands,
//! and view or edit files.

pub mod bash;
pub mod computer;
pub mod edit;

use deskpilot_config::DisplayConfig;
use deskpilot_core::tool::ToolCollection;

pub use bash::BashTool;
pub use computer::ComputerTool;
pub use edit::EditTool;

/// Create the standard collection: computer, bash, str_replace_editor.
pub fn default_collection(display: &DisplayConfig) -> ToolCollection {
    ToolCollection::new()
        .with(Box::new(ComputerTool::new(display)))
        .with(Box::new(BashTool::new()))
        .with(Box::new(EditTool::new()))
}
