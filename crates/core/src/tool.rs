//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act on the desktop:
//! run shell commands, take screenshots and click, edit files.
//! The sampling loop only ever sees them through [`ToolCollection::run`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::ToolError;

/// The outcome of a single tool execution.
///
/// `error` and the normal output are mutually exclusive in meaning; when both
/// are populated the error wins. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Normal text output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Base64-encoded PNG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,

    /// Out-of-band note for the model (e.g. "tool must be restarted")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl ToolResult {
    pub fn from_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, base64_png: impl Into<String>) -> Self {
        self.base64_image = Some(base64_png.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn output_text(&self) -> Option<&str> {
        non_empty(&self.output)
    }

    pub fn error_text(&self) -> Option<&str> {
        non_empty(&self.error)
    }

    pub fn image(&self) -> Option<&str> {
        non_empty(&self.base64_image)
    }

    pub fn system_text(&self) -> Option<&str> {
        non_empty(&self.system)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// A tool schema entry sent to the model.
///
/// Computer-use tools are declared natively by type (`computer_20241022`)
/// and carry their options inline; anything else uses a JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolParam {
    Native {
        #[serde(rename = "type")]
        kind: String,
        name: String,
        #[serde(flatten)]
        options: serde_json::Map<String, serde_json::Value>,
    },
    Custom {
        name: String,
        description: String,
        input_schema: serde_json::Value,
    },
}

impl ToolParam {
    pub fn name(&self) -> &str {
        match self {
            Self::Native { name, .. } | Self::Custom { name, .. } => name,
        }
    }
}

/// The core Tool trait.
///
/// Each tool (bash, str_replace_editor, computer) implements this trait and
/// is registered in a [`ToolCollection`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name the model uses to address this tool.
    fn name(&self) -> &str;

    /// The schema entry advertised to the model.
    fn to_param(&self) -> ToolParam;

    /// Execute the tool with the given input.
    async fn execute(&self, input: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;
}

/// An ordered collection of tools.
///
/// Registration order is preserved so the tool schema sent to the model is
/// byte-identical across calls.
pub struct ToolCollection {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolCollection {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Builder-style registration.
    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// Tool schema for the model, in registration order.
    pub fn to_params(&self) -> Vec<ToolParam> {
        self.tools.iter().map(|t| t.to_param()).collect()
    }

    /// Run a tool by name.
    pub async fn run(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        debug!(tool = name, "Running tool");
        tool.execute(input).await
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolCollection {
    fn default() -> Self {
        Self::new()
    }
}
