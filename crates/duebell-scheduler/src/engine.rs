//! Dispatch engine — one stateless run of the due-task pipeline.

use chrono::{DateTime, Utc};
use duebell_core::config::{DispatchConfig, SubscriptionPolicy};
use duebell_core::error::Result;
use duebell_core::traits::{PushTransport, TaskStore};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::dispatch::{DeliveryDispatcher, DeliveryJob};
use crate::finder::find_due_tasks;
use crate::outcome::{RunSummary, SkipReason};
use crate::payload::PayloadBuilder;
use crate::resolver::SubscriptionResolver;

/// Owns the collaborators of a run. Holds no state between runs.
pub struct DispatchEngine {
    store: Arc<dyn TaskStore>,
    dispatcher: DeliveryDispatcher,
    payloads: PayloadBuilder,
    policy: SubscriptionPolicy,
    dry_run: bool,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn TaskStore>,
        transport: Arc<dyn PushTransport>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            store,
            dispatcher: DeliveryDispatcher::new(
                transport,
                Duration::from_secs(config.send_timeout_secs),
                config.max_concurrency,
            ),
            payloads: PayloadBuilder::from_config(config),
            policy: config.policy,
            dry_run: false,
        }
    }

    /// Resolve and build everything, but make no transport calls.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// One invocation. Errors only when the due set cannot be read; every
    /// per-task and per-send problem ends up in the summary instead.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let started = Instant::now();
        let due = find_due_tasks(self.store.as_ref(), now).await?;
        let mut summary = RunSummary::new(now, due.len(), self.dry_run);

        if due.is_empty() {
            tracing::info!("😴 No due tasks at {now}");
            summary.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(summary);
        }
        tracing::info!(
            "⏰ {} due task(s) at {now} ({:?} policy, via {})",
            due.len(),
            self.policy,
            self.dispatcher.transport_name()
        );

        let resolver = SubscriptionResolver::new(self.policy, self.store.clone());
        let mut jobs = Vec::new();
        for task in &due {
            let subscriptions = match resolver.resolve(task).await {
                Ok(subs) if subs.is_empty() => {
                    summary.skip(&task.id, SkipReason::NoSubscription);
                    continue;
                }
                Ok(subs) => subs,
                Err(e) => {
                    tracing::warn!("⚠️ Could not resolve subscriptions for {}: {e}", task.id);
                    summary.skip(&task.id, SkipReason::ResolveFailed(e.to_string()));
                    continue;
                }
            };

            let payload = self.payloads.build(task);
            let bytes: Arc<[u8]> = match payload.to_bytes() {
                Ok(bytes) => bytes.into(),
                Err(e) => {
                    summary.skip(&task.id, SkipReason::ResolveFailed(e.to_string()));
                    continue;
                }
            };
            tracing::debug!(
                "📦 {} → {} subscription(s), tag {:?}",
                task.id,
                subscriptions.len(),
                payload.tag
            );
            jobs.extend(subscriptions.into_iter().map(|subscription| DeliveryJob {
                task_id: task.id.clone(),
                subscription,
                payload: bytes.clone(),
            }));
        }

        if self.dry_run {
            for job in &jobs {
                tracing::info!("🧪 Would send {} → {}", job.task_id, job.subscription.id);
            }
        } else {
            for report in self.dispatcher.deliver_all(jobs).await {
                summary.record(report);
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!("📊 Run complete: {}", summary.headline());
        if !summary.prunable.is_empty() {
            tracing::info!("🧹 Prunable subscriptions: {}", summary.prunable.join(", "));
        }
        Ok(summary)
    }
}

/// Run the engine on a fixed interval. A failed tick is logged and the loop
/// carries on; the next tick re-evaluates the same due set.
pub async fn spawn_scheduler(engine: Arc<DispatchEngine>, check_interval_secs: u64) {
    tracing::info!("⏰ Scheduler started (check every {}s)", check_interval_secs);

    let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if let Err(e) = engine.run(Utc::now()).await {
            tracing::error!("❌ Run failed: {e}");
        }
    }
}
