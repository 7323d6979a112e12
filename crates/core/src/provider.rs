//! Provider trait: the abstraction over the model API.
//!
//! A Provider knows how to send the conversation, system prompt and tool
//! schema to a model and hand back the raw response. Parsing is a separate
//! step ([`RawResponse::parse`]) so observers can see the response exactly as
//! it arrived, before anything interprets it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::ProviderError;
use crate::message::{ContentBlock, Message};
use crate::tool::ToolParam;

/// Beta flag enabling the computer-use tool types.
pub const COMPUTER_USE_BETA: &str = "computer-use-2024-10-22";

/// Which hosted API serves the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    #[default]
    Anthropic,
    Bedrock,
    Vertex,
}

impl ApiProvider {
    /// The model each provider serves by default.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-sonnet-20241022",
            Self::Bedrock => "anthropic.claude-3-5-sonnet-20241022-v2:0",
            Self::Vertex => "claude-3-5-sonnet-v2@20241022",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Bedrock => "bedrock",
            Self::Vertex => "vertex",
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "bedrock" => Ok(Self::Bedrock),
            "vertex" => Ok(Self::Vertex),
            other => Err(format!("unknown provider '{other}' (expected anthropic, bedrock or vertex)")),
        }
    }
}

/// One model call.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-3-5-sonnet-20241022")
    pub model: String,

    /// System prompt, sent as a top-level field
    pub system: String,

    /// The full conversation history
    pub messages: Vec<Message>,

    /// Tools the model can call
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolParam>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Beta feature flags
    #[serde(skip)]
    pub betas: Vec<String>,
}

/// A response exactly as the transport received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body (JSON)
    pub body: String,
}

impl RawResponse {
    /// Build a successful raw response from already-typed content.
    ///
    /// Used by scripted providers.
    pub fn from_content(id: &str, model: &str, content: &[ContentBlock]) -> Self {
        let stop_reason = if content.iter().any(ContentBlock::is_tool_use) {
            "tool_use"
        } else {
            "end_turn"
        };
        let body = serde_json::json!({
            "id": id,
            "type": "message",
            "role": "assistant",
            "model": model,
            "content": content,
            "stop_reason": stop_reason,
            "usage": { "input_tokens": 0, "output_tokens": 0 }
        });
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    /// Parse the body into typed content.
    pub fn parse(&self) -> std::result::Result<ProviderResponse, ProviderError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse message: {e}")))
    }

    /// The text blocks of the body, for display. Empty if the body is not a message.
    pub fn text_content(&self) -> String {
        self.parse()
            .map(|r| {
                r.content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

/// A parsed model response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderResponse {
    /// Message id assigned by the API
    #[serde(default)]
    pub id: String,

    /// Which model actually responded
    #[serde(default)]
    pub model: String,

    /// Ordered text / tool_use blocks
    pub content: Vec<ContentBlock>,

    #[serde(default)]
    pub stop_reason: Option<String>,

    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ProviderResponse {
    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(ContentBlock::is_tool_use)
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// The core Provider trait.
///
/// Anthropic, Vertex and Bedrock backends implement this trait; the sampling
/// loop calls `complete()` without knowing which one it talks to.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get the raw response back.
    ///
    /// Non-success statuses are reported as errors, never as a `RawResponse`.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<RawResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_default_models() {
        assert_eq!(ApiProvider::Anthropic.default_model(), "claude-3-5-sonnet-20241022");
        assert!(ApiProvider::Bedrock.default_model().starts_with("anthropic."));
        assert!(ApiProvider::Vertex.default_model().contains('@'));
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("Vertex".parse::<ApiProvider>().unwrap(), ApiProvider::Vertex);
        assert!("openai".parse::<ApiProvider>().is_err());
        assert_eq!(ApiProvider::Bedrock.to_string(), "bedrock");
    }

    #[test]
    fn raw_response_roundtrips_through_parse() {
        let blocks = vec![
            ContentBlock::text("Let me look"),
            ContentBlock::ToolUse {
                id: "toolu_1".into(),
                name: "computer".into(),
                input: serde_json::json!({"action": "screenshot"}),
            },
        ];
        let raw = RawResponse::from_content("msg_1", "mock", &blocks);
        let parsed = raw.parse().unwrap();
        assert_eq!(parsed.content, blocks);
        assert_eq!(parsed.stop_reason.as_deref(), Some("tool_use"));
        assert!(parsed.has_tool_use());
        assert_eq!(raw.text_content(), "Let me look");
    }

    #[test]
    fn malformed_body_is_invalid_response() {
        let raw = RawResponse {
            status: 200,
            body: "{\"content\": 42}".into(),
        };
        assert!(matches!(raw.parse(), Err(ProviderError::InvalidResponse(_))));
        assert!(raw.text_content().is_empty());
    }

    #[test]
    fn request_serializes_without_betas() {
        let req = ProviderRequest {
            model: "m".into(),
            system: "sys".into(),
            messages: vec![Message::user("hi")],
            tools: vec![],
            max_tokens: 4096,
            betas: vec![COMPUTER_USE_BETA.into()],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["system"], "sys");
        assert_eq!(json["max_tokens"], 4096);
        assert!(json.get("betas").is_none());
        assert!(json.get("tools").is_none());
    }
}
