//! # Execution Errors
//!
//! Failures observed while submitting a pipeline or consuming its stream.
//! A failed execution never yields a partial result set.

use thiserror::Error;

use crate::errors::BuildError;

/// Result type for execution operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Execution errors
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    // ==================
    // Local Errors
    // ==================
    /// The pipeline could not be serialized; nothing was sent
    #[error("Pipeline rejected: {0}")]
    Rejected(#[from] BuildError),

    /// A row payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    // ==================
    // Stream Errors
    // ==================
    /// Network or RPC failure reported by the transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server-side rejection
    #[error("Server error {code}: {message}")]
    Server { code: String, message: String },

    /// The stream ended without a completion or error signal
    #[error("Stream closed before completion")]
    StreamClosed,

    /// The caller abandoned the execution
    #[error("Execution cancelled")]
    Cancelled,

    // ==================
    // Internal Errors
    // ==================
    /// Driver task failure
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl ExecutionError {
    /// Whether the transport collaborator could sensibly retry.
    ///
    /// This layer never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutionError::Transport(_) | ExecutionError::StreamClosed => true,
            ExecutionError::Server { code, .. } => {
                matches!(code.as_str(), "UNAVAILABLE" | "ABORTED" | "RESOURCE_EXHAUSTED")
            }
            _ => false,
        }
    }

    /// Short machine-readable kind, used in log events
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::Rejected(_) => "rejected",
            ExecutionError::Decode(_) => "decode",
            ExecutionError::Transport(_) => "transport",
            ExecutionError::Server { .. } => "server",
            ExecutionError::StreamClosed => "stream_closed",
            ExecutionError::Cancelled => "cancelled",
            ExecutionError::Runtime(_) => "runtime",
        }
    }
}
