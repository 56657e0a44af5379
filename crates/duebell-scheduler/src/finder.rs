//! Finds the tasks whose due timestamp has elapsed.

use chrono::{DateTime, Utc};
use duebell_core::error::{DuebellError, Result};
use duebell_core::traits::TaskStore;
use duebell_core::types::{Task, order_tasks};
use std::collections::HashSet;

/// Every task due at `now`, each exactly once, earliest due first.
///
/// Any store failure is [`DuebellError::StoreUnavailable`]: a partial due set
/// would under- or over-notify, so nothing is sent without a complete one.
pub async fn find_due_tasks(store: &dyn TaskStore, now: DateTime<Utc>) -> Result<Vec<Task>> {
    let tasks = store.due_tasks(now).await.map_err(|e| match e {
        DuebellError::StoreUnavailable(_) => e,
        other => DuebellError::StoreUnavailable(other.to_string()),
    })?;

    let mut seen = HashSet::new();
    let mut due: Vec<Task> = tasks
        .into_iter()
        .filter(|task| task.is_due(now))
        .filter(|task| seen.insert(task.id.clone()))
        .collect();
    order_tasks(&mut due);

    tracing::debug!("🔎 {} due task(s) from {} at {}", due.len(), store.name(), now);
    Ok(due)
}
