//! Execution layer error types.

use thiserror::Error;

/// Errors that can occur during execution operations.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// Exchange communication error (connect failure, timeout, HTTP error)
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// Order was rejected by exchange (`success=false`)
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Exchange answered with something we could not interpret
    #[error("Invalid exchange response: {0}")]
    InvalidResponse(String),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] signalflip_domain::DomainError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExecError {
    /// True for failures worth retrying (network-level, not logical rejections)
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecError::Exchange(_))
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
