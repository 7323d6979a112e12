//! Error types for the DeskPilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Tool failures never reach
//! the top level: the loop turns them into error results for the model.

use thiserror::Error;

/// The top-level error type for all DeskPilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Insight log errors ---
    #[error("Insight log error: {0}")]
    Insight(#[from] InsightError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the model call. These are never retried by the loop itself.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        });
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = ToolError::ExecutionFailed {
            tool_name: "computer".into(),
            reason: "screencapture missing".into(),
        };
        assert!(err.to_string().contains("computer"));
        assert!(err.to_string().contains("screencapture missing"));
    }

    #[test]
    fn insight_error_converts_into_top_level() {
        let err: Error = InsightError::Storage("disk full".into()).into();
        assert!(matches!(err, Error::Insight(_)));
        assert!(err.to_string().contains("disk full"));
    }
}
