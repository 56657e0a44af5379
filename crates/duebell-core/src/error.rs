//! Duebell error types.
//!
//! Only [`DuebellError::ConfigIncomplete`] and [`DuebellError::StoreUnavailable`]
//! abort an invocation. Every other kind is captured per (task, subscription)
//! pair and reported in the run summary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DuebellError>;

#[derive(Debug, Error)]
pub enum DuebellError {
    #[error("Configuration incomplete: {0}")]
    ConfigIncomplete(String),

    #[error("Task store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("No subscription linked to task {0}")]
    SubscriptionMissing(String),

    #[error("Subscription descriptor invalid: {0}")]
    SubscriptionDescriptorInvalid(String),

    #[error("Transient delivery failure: {0}")]
    TransientDeliveryFailure(String),

    #[error("Push endpoint gone: {0}")]
    PermanentDeliveryFailure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DuebellError {
    /// Whether this error must abort the whole invocation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigIncomplete(_) | Self::StoreUnavailable(_))
    }

    /// Process exit code reported to the invoking scheduler.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigIncomplete(_) => 2,
            Self::StoreUnavailable(_) => 3,
            _ => 1,
        }
    }
}
