//! Capability traits consumed by the dispatch pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DuebellError, Result};
use crate::types::{PushEndpoint, Subscription, Task};

/// Read-only view of the durable store holding tasks and subscriptions.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Tasks with a non-null due timestamp at or before `now`, with their
    /// linked subscription attached when the store tracks one.
    ///
    /// Any failure to reach the store or decode its rows is
    /// [`DuebellError::StoreUnavailable`].
    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>>;

    /// Every known subscription.
    async fn subscriptions(&self) -> Result<Vec<Subscription>>;
}

/// Whether a transport error means the endpoint is gone for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Gone,
    Other,
}

/// Error reported by a [`PushTransport`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// HTTP status from the push service, when one was received.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn gone(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Gone,
            status: None,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Other,
            status: None,
            message: message.into(),
        }
    }

    /// Classify by push-service HTTP status: 404 and 410 mean the endpoint is gone.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            404 | 410 => TransportErrorKind::Gone,
            _ => TransportErrorKind::Other,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_gone(&self) -> bool {
        self.kind == TransportErrorKind::Gone
    }
}

impl From<TransportError> for DuebellError {
    fn from(e: TransportError) -> Self {
        let detail = match e.status {
            Some(status) => format!("{} (HTTP {status})", e.message),
            None => e.message,
        };
        match e.kind {
            TransportErrorKind::Gone => DuebellError::PermanentDeliveryFailure(detail),
            TransportErrorKind::Other => DuebellError::TransientDeliveryFailure(detail),
        }
    }
}

/// Authenticated delivery of one encrypted payload to one endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(
        &self,
        endpoint: &PushEndpoint,
        payload: &[u8],
    ) -> std::result::Result<(), TransportError>;
}
