//! services/api/src/error.rs
//!
//! Everything that can stop the service from starting or shut it down
//! uncleanly. Request-level failures are mapped to status codes in the
//! handlers and never reach this type.

use crate::config::ConfigError;
use eldercare_core::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An adapter could not be constructed (e.g. the vision HTTP client).
    #[error("Adapter setup failed: {0}")]
    Adapter(#[from] PortError),

    /// The configured CORS origin is not a valid header value.
    #[error("Invalid CORS origin '{origin}': {reason}")]
    CorsOrigin { origin: String, reason: String },

    /// Binding or serving the HTTP listener failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The scheduler task panicked or was aborted.
    #[error("Scheduler task failed: {0}")]
    Scheduler(#[from] tokio::task::JoinError),
}
