//! File-based store — a JSON snapshot of tasks and subscriptions.
//! Human-readable, handy for local runs. Re-read on every query so edits
//! between invocations are picked up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duebell_core::error::{DuebellError, Result};
use duebell_core::traits::TaskStore;
use duebell_core::types::{Subscription, Task, order_subscriptions, order_tasks};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Snapshot layout: `{ "tasks": [...], "subscriptions": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<SnapshotTask>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

/// A task as written in the snapshot; the link is by subscription ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription_id: Option<String>,
}

/// JSON-file task store.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Write a snapshot to disk.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("💾 Saved snapshot to {}", self.path.display());
        Ok(())
    }

    /// Load the snapshot. A missing file is a store failure, not an empty store.
    pub fn load(&self) -> Result<Snapshot> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            DuebellError::StoreUnavailable(format!("Read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            DuebellError::StoreUnavailable(format!("Parse {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl TaskStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let snapshot = self.load()?;
        let mut tasks: Vec<Task> = snapshot
            .tasks
            .iter()
            .filter(|t| t.due_at.is_some_and(|due| due <= now))
            .map(|t| Task {
                id: t.id.clone(),
                name: t.name.clone(),
                due_at: t.due_at,
                subscription: t.subscription_id.as_ref().and_then(|sid| {
                    snapshot.subscriptions.iter().find(|s| &s.id == sid).cloned()
                }),
            })
            .collect();
        order_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        let mut subscriptions = self.load()?.subscriptions;
        order_subscriptions(&mut subscriptions);
        Ok(subscriptions)
    }
}
