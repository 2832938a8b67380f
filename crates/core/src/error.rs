//! Error types for the FractalBot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all FractalBot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Backend contract errors ---
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // --- Request validation ---
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Violations of the JSON contract the language backend must honour.
///
/// Every variant is fatal to the current loop invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("AI response must be valid JSON: {0}")]
    InvalidJson(String),

    #[error("Response must be a JSON object")]
    NotAnObject,

    #[error("Response must include a 'type' field")]
    MissingType,

    #[error("Invalid response type: {0}")]
    UnknownType(String),

    #[error("Invalid '{kind}' payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}
