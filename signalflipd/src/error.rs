//! Daemon error types.

use signalflip_domain::DomainError;
use thiserror::Error;

/// Daemon-level errors.
///
/// Signal handling never returns these; they only surface while starting up.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// API server error
    #[error("API server error: {0}")]
    Api(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
