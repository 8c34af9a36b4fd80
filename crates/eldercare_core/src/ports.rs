//! crates/eldercare_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the vision provider, the messaging transport, the sound
//! device and the system clock.

use async_trait::async_trait;
use chrono::NaiveDateTime;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, parsing).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("External service error: {0}")]
    Service(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The image-understanding service that judges a photo against an instruction.
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Sends the image and instruction, returning the raw text of the model's reply.
    async fn judge_photo(&self, image: &[u8], mime_type: &str, instruction: &str)
        -> PortResult<String>;
}

/// The outbound channel used to reach the family contact.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers a composed message to a recipient handle (phone number, chat id...).
    async fn deliver(&self, recipient: &str, message: &str) -> PortResult<()>;
}

/// The continuous attention signal played while an alarm is raised.
///
/// Both calls must be idempotent: `stop` is invoked on every exit from the
/// alarming state, even when nothing is playing.
pub trait AttentionSignal: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

/// Local wall-clock time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}
