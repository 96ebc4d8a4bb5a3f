//! Error types for the M.E.M.I.R. domain.
//!
//! Each subsystem has its own error enum; [`Error`] wraps the two that can
//! reach a caller so the edges can use one `?`.

use thiserror::Error;

/// What can escape an exchange: oracle failures and memory store failures.
/// Tool problems never do; they become [`crate::tool::ToolResult`]s.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
}

// ── Subsystem errors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    /// An embedder or index failure, tagged with the store operation that hit it.
    #[error("Storage backend error during {operation}: {cause}")]
    StorageBackend { operation: String, cause: String },

    #[error("Memory not found: {id}")]
    NotFound { id: String },

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Index operation failed: {0}")]
    Index(String),

    #[error("Invalid memory record: {0}")]
    InvalidRecord(String),

    #[error("Invalid memory request: {0}")]
    InvalidRequest(String),
}

impl MemoryError {
    /// Wrap any lower-level failure as a backend error for `operation`.
    pub fn backend(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::StorageBackend {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
