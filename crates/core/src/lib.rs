//! # DeskPilot Core
//!
//! Domain types, traits, and error definitions for the DeskPilot
//! computer-use agent. No HTTP, no process spawning, no filesystem: this
//! crate defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the sampling loop is defined as a trait here:
//! - [`Provider`]: the model API transport
//! - [`Tool`]: a single executable capability (bash, editor, computer)
//! - [`InsightStore`]: the append-only insight log
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted providers, failing tools and in-memory stores.

pub mod error;
pub mod insight;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, InsightError, ProviderError, Result, ToolError};
pub use insight::InsightStore;
pub use message::{
    ContentBlock, Conversation, ConversationId, ImageSource, Message, MessageContent, Role,
    ToolResultContent,
};
pub use provider::{ApiProvider, Provider, ProviderRequest, ProviderResponse, RawResponse, Usage};
pub use tool::{Tool, ToolCollection, ToolParam, ToolResult};
