//! Per-send reports rolled into one run summary.

use chrono::{DateTime, Utc};
use duebell_core::types::DeliveryOutcome;
use serde::Serialize;

/// Outcome of one (task, subscription) send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub task_id: String,
    pub subscription_id: String,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

/// Why a due task produced no sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    NoSubscription,
    ResolveFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTask {
    pub task_id: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// What one invocation did. The only observable side effect besides the sends.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub now: DateTime<Utc>,
    pub dry_run: bool,
    pub due_task_count: usize,
    pub attempted_count: usize,
    pub sent_count: usize,
    /// Every non-delivered send.
    pub failures: Vec<DeliveryReport>,
    pub skipped: Vec<SkippedTask>,
    /// Subscriptions whose endpoint is gone or unparseable, each listed once.
    pub prunable: Vec<String>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn new(now: DateTime<Utc>, due_task_count: usize, dry_run: bool) -> Self {
        Self {
            now,
            dry_run,
            due_task_count,
            ..Default::default()
        }
    }

    pub fn skip(&mut self, task_id: &str, reason: SkipReason) {
        self.skipped.push(SkippedTask {
            task_id: task_id.to_string(),
            reason,
        });
    }

    pub fn record(&mut self, report: DeliveryReport) {
        self.attempted_count += 1;
        if report.outcome.is_delivered() {
            self.sent_count += 1;
            return;
        }
        if report.outcome.is_permanent() && !self.prunable.contains(&report.subscription_id) {
            self.prunable.push(report.subscription_id.clone());
        }
        self.failures.push(report);
    }

    pub fn transient_count(&self) -> usize {
        self.failures.iter().filter(|r| !r.outcome.is_permanent()).count()
    }

    pub fn permanent_count(&self) -> usize {
        self.failures.iter().filter(|r| r.outcome.is_permanent()).count()
    }

    /// One-line form for the final log message.
    pub fn headline(&self) -> String {
        format!(
            "{} due, {} attempted, {} delivered, {} transient, {} invalid, {} skipped",
            self.due_task_count,
            self.attempted_count,
            self.sent_count,
            self.transient_count(),
            self.permanent_count(),
            self.skipped.len()
        )
    }
}
