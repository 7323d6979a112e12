//! Computer tool: macOS desktop control.
//!
//! Screenshots come from `screencapture` (resized with `sips` to the
//! advertised display size), mouse and keyboard go through `cliclick`.
//! Every action except `screenshot` and `cursor_position` is followed by a
//! fresh screenshot so the model sees the effect.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use deskpilot_config::DisplayConfig;
use deskpilot_core::error::ToolError;
use deskpilot_core::tool::{Tool, ToolParam, ToolResult};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const TOOL_NAME: &str = "computer";
const TYPING_CHUNK: usize = 50;
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// A mouse / keyboard / screen action requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Screenshot,
    CursorPosition,
    MouseMove(u32, u32),
    LeftClickDrag(u32, u32),
    LeftClick,
    RightClick,
    DoubleClick,
    Type(String),
    Key(String),
}

impl Action {
    /// Parse the tool input into an action, validating its parameters.
    pub fn parse(input: &serde_json::Value) -> Result<Self, ToolError> {
        let action = input["action"]
            .as_str()
            .ok_or_else(|| invalid("Missing 'action' argument"))?;
        let coordinate = &input["coordinate"];
        let text = input["text"].as_str();

        let needs_coordinate = matches!(action, "mouse_move" | "left_click_drag");
        let needs_text = matches!(action, "type" | "key");

        if !needs_coordinate && !coordinate.is_null() {
            return Err(invalid(&format!("coordinate is not accepted for {action}")));
        }
        if !needs_text && text.is_some() {
            return Err(invalid(&format!("text is not accepted for {action}")));
        }

        let point = || parse_coordinate(coordinate, action);
        let text = || {
            text.filter(|t| !t.is_empty())
                .map(str::to_string)
                .ok_or_else(|| invalid(&format!("text is required for {action}")))
        };

        Ok(match action {
            "screenshot" => Self::Screenshot,
            "cursor_position" => Self::CursorPosition,
            "mouse_move" => {
                let (x, y) = point()?;
                Self::MouseMove(x, y)
            }
            "left_click_drag" => {
                let (x, y) = point()?;
                Self::LeftClickDrag(x, y)
            }
            "left_click" => Self::LeftClick,
            "right_click" => Self::RightClick,
            "double_click" => Self::DoubleClick,
            "type" => Self::Type(text()?),
            "key" => Self::Key(text()?),
            other => return Err(invalid(&format!("Invalid action: {other}"))),
        })
    }

    /// Arguments for `cliclick`, or `None` for actions it does not perform.
    pub fn cliclick_args(&self) -> Option<Vec<String>> {
        let args = match self {
            Self::Screenshot => return None,
            Self::CursorPosition => vec!["p".to_string()],
            Self::MouseMove(x, y) => vec![format!("m:{x},{y}")],
            Self::LeftClickDrag(x, y) => vec!["dd:.".to_string(), format!("du:{x},{y}")],
            Self::LeftClick => vec!["c:.".to_string()],
            Self::RightClick => vec!["rc:.".to_string()],
            Self::DoubleClick => vec!["dc:.".to_string()],
            Self::Type(text) => text
                .chars()
                .collect::<Vec<_>>()
                .chunks(TYPING_CHUNK)
                .map(|chunk| format!("t:{}", chunk.iter().collect::<String>()))
                .collect(),
            Self::Key(combo) => key_args(combo),
        };
        Some(args)
    }

    fn wants_screenshot(&self) -> bool {
        !matches!(self, Self::Screenshot | Self::CursorPosition)
    }
}

fn invalid(message: &str) -> ToolError {
    ToolError::InvalidArguments(message.to_string())
}

fn parse_coordinate(value: &serde_json::Value, action: &str) -> Result<(u32, u32), ToolError> {
    let pair = value
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| invalid(&format!("coordinate is required for {action}")))?;
    let axis = |v: &serde_json::Value| {
        v.as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| invalid(&format!("{value} must be a tuple of non-negative ints")))
    };
    Ok((axis(&pair[0])?, axis(&pair[1])?))
}

/// Translate an xdotool-style key combo (`ctrl+shift+t`, `Return`) into
/// `cliclick` key-down / key-press / key-up commands.
fn key_args(combo: &str) -> Vec<String> {
    let parts: Vec<&str> = combo.split('+').map(str::trim).collect();
    let (key, modifiers) = match parts.split_last() {
        Some((key, modifiers)) => (*key, modifiers),
        None => (combo, &[][..]),
    };

    let modifiers: Vec<&str> = modifiers.iter().filter_map(|m| modifier_name(m)).collect();

    let mut args = Vec::new();
    if !modifiers.is_empty() {
        args.push(format!("kd:{}", modifiers.join(",")));
    }
    match special_key(key) {
        Some(name) => args.push(format!("kp:{name}")),
        None => args.push(format!("t:{key}")),
    }
    if !modifiers.is_empty() {
        args.push(format!("ku:{}", modifiers.join(",")));
    }
    args
}

fn modifier_name(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "ctrl" | "control" => Some("ctrl"),
        "alt" | "option" => Some("alt"),
        "shift" => Some("shift"),
        "cmd" | "command" | "super" | "meta" => Some("cmd"),
        "fn" => Some("fn"),
        _ => None,
    }
}

fn special_key(name: &str) -> Option<&'static str> {
    Some(match name.to_lowercase().as_str() {
        "return" | "enter" | "kp_enter" => "return",
        "escape" | "esc" => "esc",
        "tab" => "tab",
        "space" => "space",
        "backspace" => "delete",
        "delete" => "fwd-delete",
        "up" => "arrow-up",
        "down" => "arrow-down",
        "left" => "arrow-left",
        "right" => "arrow-right",
        "home" => "home",
        "end" => "end",
        "page_up" | "prior" => "page-up",
        "page_down" | "next" => "page-down",
        "f1" => "f1",
        "f2" => "f2",
        "f3" => "f3",
        "f4" => "f4",
        "f5" => "f5",
        "f6" => "f6",
        "f7" => "f7",
        "f8" => "f8",
        "f9" => "f9",
        "f10" => "f10",
        "f11" => "f11",
        "f12" => "f12",
        _ => return None,
    })
}

/// Desktop control through macOS command-line utilities.
pub struct ComputerTool {
    width: u32,
    height: u32,
    display_number: Option<u32>,
}

impl ComputerTool {
    pub fn new(display: &DisplayConfig) -> Self {
        Self {
            width: display.width,
            height: display.height,
            display_number: display.display_number,
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<String, ToolError> {
        debug!(program, ?args, "Running desktop command");
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: format!("{program}: {e}"),
            })?;

        if !output.status.success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: format!(
                    "{program} exited with {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Capture the screen and return it as base64 PNG.
    async fn screenshot(&self) -> Result<String, ToolError> {
        let path: PathBuf =
            std::env::temp_dir().join(format!("deskpilot_{}.png", uuid::Uuid::new_v4()));
        let path_arg = path.display().to_string();

        let mut args = vec!["-x".to_string()];
        if let Some(display) = self.display_number {
            args.push(format!("-D{display}"));
        }
        args.push(path_arg.clone());
        self.run("screencapture", &args).await?;

        let resize = [
            "--resampleHeightWidth".to_string(),
            self.height.to_string(),
            self.width.to_string(),
            path_arg,
        ];
        if let Err(e) = self.run("sips", &resize).await {
            warn!(error = %e, "Screenshot resize failed, sending native resolution");
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: format!("failed to read screenshot: {e}"),
            })?;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary screenshot");
        }

        Ok(general_purpose::STANDARD.encode(&bytes))
    }
}

#[async_trait]
impl Tool for ComputerTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn to_param(&self) -> ToolParam {
        let mut options = serde_json::Map::new();
        options.insert("display_width_px".into(), self.width.into());
        options.insert("display_height_px".into(), self.height.into());
        if let Some(number) = self.display_number {
            options.insert("display_number".into(), number.into());
        }
        ToolParam::Native {
            kind: "computer_20241022".into(),
            name: TOOL_NAME.into(),
            options,
        }
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult, ToolError> {
        let action = Action::parse(&input)?;

        let Some(args) = action.cliclick_args() else {
            return Ok(ToolResult::default().with_image(self.screenshot().await?));
        };

        let stdout = self.run("cliclick", &args).await?;

        if action == Action::CursorPosition {
            let (x, y) = stdout.split_once(',').unwrap_or((stdout.as_str(), ""));
            return Ok(ToolResult::from_output(format!("X={},Y={}", x.trim(), y.trim())));
        }

        let mut result = ToolResult::from_output(stdout);
        if action.wants_screenshot() {
            tokio::time::sleep(SETTLE_DELAY).await;
            result = result.with_image(self.screenshot().await?);
        }
        Ok(result)
    }
}
