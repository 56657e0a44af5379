//! Delivery dispatch — one isolated send per (task, subscription).
//!
//! Sends are spawned, bounded by a semaphore and individually timed out.
//! Every handle is awaited in submission order, so a failing, hanging or
//! panicking send turns into its own outcome and never touches its siblings.

use duebell_core::error::DuebellError;
use duebell_core::traits::PushTransport;
use duebell_core::types::{DeliveryOutcome, PushEndpoint, Subscription};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::outcome::DeliveryReport;

/// One pending send.
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub task_id: String,
    pub subscription: Subscription,
    pub payload: Arc<[u8]>,
}

/// Sends payloads through a [`PushTransport`] and classifies the result.
#[derive(Clone)]
pub struct DeliveryDispatcher {
    transport: Arc<dyn PushTransport>,
    timeout: Duration,
    limit: Arc<Semaphore>,
}

impl DeliveryDispatcher {
    pub fn new(transport: Arc<dyn PushTransport>, timeout: Duration, max_concurrency: usize) -> Self {
        Self {
            transport,
            timeout,
            limit: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Deliver one payload. Never fails: every error is an outcome.
    pub async fn deliver(&self, subscription: &Subscription, payload: &[u8]) -> DeliveryOutcome {
        let endpoint = match PushEndpoint::from_descriptor(&subscription.descriptor) {
            Ok(endpoint) => endpoint,
            Err(e) => return classify(e),
        };

        match tokio::time::timeout(self.timeout, self.transport.send(&endpoint, payload)).await {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(e)) => classify(e.into()),
            Err(_) => DeliveryOutcome::TransientFailure {
                reason: format!("send timed out after {}s", self.timeout.as_secs_f32()),
            },
        }
    }

    /// Run every job concurrently and collect one report per job, in input order.
    pub async fn deliver_all(&self, jobs: Vec<DeliveryJob>) -> Vec<DeliveryReport> {
        let mut pending = Vec::with_capacity(jobs.len());
        for job in jobs {
            let dispatcher = self.clone();
            let task_id = job.task_id.clone();
            let subscription_id = job.subscription.id.clone();
            let handle = tokio::spawn(async move {
                // The semaphore is never closed.
                let _permit = dispatcher.limit.clone().acquire_owned().await.ok();
                dispatcher.deliver(&job.subscription, &job.payload).await
            });
            pending.push((task_id, subscription_id, handle));
        }

        let mut reports = Vec::with_capacity(pending.len());
        for (task_id, subscription_id, handle) in pending {
            let outcome = handle.await.unwrap_or_else(|e| DeliveryOutcome::TransientFailure {
                reason: format!("send aborted: {e}"),
            });
            log_outcome(&task_id, &subscription_id, &outcome);
            reports.push(DeliveryReport {
                task_id,
                subscription_id,
                outcome,
            });
        }
        reports
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }
}

/// Map a per-send error onto the outcome taxonomy.
pub fn classify(err: DuebellError) -> DeliveryOutcome {
    match err {
        DuebellError::SubscriptionDescriptorInvalid(reason)
        | DuebellError::PermanentDeliveryFailure(reason) => DeliveryOutcome::PermanentInvalid { reason },
        other => DeliveryOutcome::TransientFailure {
            reason: other.to_string(),
        },
    }
}

fn log_outcome(task_id: &str, subscription_id: &str, outcome: &DeliveryOutcome) {
    match outcome {
        DeliveryOutcome::Delivered => {
            tracing::info!("✅ Delivered {task_id} → {subscription_id}");
        }
        DeliveryOutcome::TransientFailure { reason } => {
            tracing::warn!("⚠️ {task_id} → {subscription_id} failed, next run retries: {reason}");
        }
        DeliveryOutcome::PermanentInvalid { reason } => {
            tracing::warn!("🗑️ {task_id} → {subscription_id} is invalid: {reason}");
        }
    }
}
