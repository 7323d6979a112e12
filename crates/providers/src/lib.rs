//! Model API transports for DeskPilot.
//!
//! All providers implement the `deskpilot_core::Provider` trait.
//! `build_from_config` picks the transport for the configured API.

pub mod anthropic;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use router::build_from_config;
