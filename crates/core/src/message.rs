//! Message and Conversation domain types.
//!
//! These mirror the Messages API wire shape directly, so a conversation can be
//! sent to the model without any translation layer:
//! user types a request → model answers with text and `tool_use` blocks →
//! tools run → their outcomes come back as `tool_result` blocks in a user turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
///
/// Tool results travel in `user` turns, the system prompt travels outside
/// the message list, so two roles are enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user, or the loop reporting tool results
    User,
    /// The model
    Assistant,
}

/// Base64 image payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
}

/// One typed block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: ToolResultContent,
        #[serde(default)]
        is_error: bool,
    },
    Image {
        source: ImageSource,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// A base64 PNG image block.
    pub fn png(data: impl Into<String>) -> Self {
        Self::Image {
            source: ImageSource::Base64 {
                media_type: "image/png".into(),
                data: data.into(),
            },
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// The body of a `tool_result` block: a bare string (used for errors) or an
/// ordered list of text/image sub-blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for ToolResultContent {
    fn default() -> Self {
        Self::Blocks(Vec::new())
    }
}

/// Message content: plain text or an ordered list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// Text or typed blocks
    pub content: MessageContent,
}

impl Message {
    /// Create a new plain-text user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a new plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant turn from the model's content blocks.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Create the aggregated user turn carrying tool results.
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Content blocks of this message (empty for plain text).
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            MessageContent::Text(_) => &[],
            MessageContent::Blocks(blocks) => blocks,
        }
    }

    /// Concatenated text of this message, `None` when it carries no text.
    pub fn text(&self) -> Option<String> {
        match &self.content {
            MessageContent::Text(text) => Some(text.clone()),
            MessageContent::Blocks(blocks) => {
                let parts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
        }
    }

    /// True for user turns that only report tool results back to the model.
    pub fn is_tool_result_turn(&self) -> bool {
        self.role == Role::User
            && !self.blocks().is_empty()
            && self
                .blocks()
                .iter()
                .all(|b| matches!(b, ContentBlock::ToolResult { .. }))
    }
}

/// A conversation is an ordered sequence of messages with shared context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Remove and return the most recent message.
    pub fn pop(&mut self) -> Option<Message> {
        self.updated_at = Utc::now();
        self.messages.pop()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Open Safari");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text().as_deref(), Some("Open Safari"));
        assert!(msg.blocks().is_empty());
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Message::user("First message"));
        assert_eq!(conv.len(), 1);
        assert!(conv.updated_at >= created);
    }

    #[test]
    fn plain_text_message_serializes_as_string_content() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn tool_result_turn_wire_shape() {
        let msg = Message::tool_results(vec![ContentBlock::ToolResult {
            tool_use_id: "toolu_1".into(),
            content: ToolResultContent::Blocks(vec![
                ContentBlock::text("done"),
                ContentBlock::png("iVBORw0KGgo="),
            ]),
            is_error: false,
        }]);
        let json = serde_json::to_value(&msg).unwrap();
        let block = &json["content"][0];
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["tool_use_id"], "toolu_1");
        assert_eq!(block["content"][0]["type"], "text");
        assert_eq!(block["content"][1]["type"], "image");
        assert_eq!(block["content"][1]["source"]["type"], "base64");
        assert_eq!(block["content"][1]["source"]["media_type"], "image/png");
        assert!(msg.is_tool_result_turn());
    }

    #[test]
    fn error_tool_result_parses_from_string_content() {
        let block: ContentBlock = serde_json::from_str(
            r#"{"type":"tool_result","tool_use_id":"toolu_9","content":"boom","is_error":true}"#,
        )
        .unwrap();
        match block {
            ContentBlock::ToolResult {
                content, is_error, ..
            } => {
                assert!(is_error);
                assert_eq!(content, ToolResultContent::Text("boom".into()));
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn text_joins_only_text_blocks() {
        let msg = Message::assistant_blocks(vec![
            ContentBlock::text("Taking a screenshot"),
            ContentBlock::ToolUse {
                id: "toolu_1".into(),
                name: "computer".into(),
                input: serde_json::json!({"action": "screenshot"}),
            },
            ContentBlock::text("then clicking"),
        ]);
        assert_eq!(msg.text().as_deref(), Some("Taking a screenshot\nthen clicking"));
        assert!(!msg.is_tool_result_turn());
    }
}
