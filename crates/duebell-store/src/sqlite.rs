//! SQLite backend — same two tables as the hosted store, with the task link
//! held in a `subscription_id` column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duebell_core::error::{DuebellError, Result};
use duebell_core::traits::TaskStore;
use duebell_core::types::{Subscription, Task, order_subscriptions, order_tasks};
use std::path::Path;
use std::sync::Mutex;

use crate::parse_timestamp;

/// SQLite-backed task store.
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open or create the database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| DuebellError::StoreUnavailable(format!("DB open: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create tables if absent.
    fn migrate(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
            CREATE TABLE IF NOT EXISTS push_subscriptions (
                id TEXT PRIMARY KEY,
                subscription TEXT,               -- PushSubscription JSON
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS push_tasks (
                task_id TEXT PRIMARY KEY,
                task_name TEXT NOT NULL,
                next_due_date TEXT,              -- RFC 3339, NULL = never due
                subscription_id TEXT REFERENCES push_subscriptions(id)
            );

            CREATE INDEX IF NOT EXISTS idx_push_tasks_due ON push_tasks(next_due_date);
            ",
            )
        })
        .map_err(|e| DuebellError::StoreUnavailable(format!("Migration: {e}")))
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<T> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&conn)
    }

    // ─── Seeding ──────────────────────────────────────────────

    /// Insert or replace a task row.
    pub fn upsert_task(&self, task: &Task, subscription_id: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO push_tasks (task_id, task_name, next_due_date, subscription_id)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    task.id,
                    task.name,
                    task.due_at.map(|t| t.to_rfc3339()),
                    subscription_id,
                ],
            )
        })
        .map_err(|e| DuebellError::StoreUnavailable(format!("Save task: {e}")))?;
        Ok(())
    }

    /// Insert or replace a subscription row.
    pub fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        let descriptor = match &subscription.descriptor {
            serde_json::Value::Null => None,
            serde_json::Value::String(raw) => Some(raw.clone()),
            other => Some(other.to_string()),
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO push_subscriptions (id, subscription, updated_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    subscription.id,
                    descriptor,
                    subscription.updated_at.to_rfc3339(),
                ],
            )
        })
        .map_err(|e| DuebellError::StoreUnavailable(format!("Save subscription: {e}")))?;
        Ok(())
    }
}

type TaskRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

type SubscriptionRow = (String, Option<String>, String);

fn subscription_from_row(id: String, raw: Option<String>, updated_at: &str) -> Result<Subscription> {
    Ok(Subscription {
        id,
        descriptor: raw.map(serde_json::Value::String).unwrap_or_default(),
        updated_at: parse_timestamp(updated_at)?,
    })
}

#[async_trait]
impl TaskStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        // Stored text may mix offsets, so the due comparison happens after parsing.
        let rows: Vec<TaskRow> = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.task_id, t.task_name, t.next_due_date,
                            s.id, s.subscription, s.updated_at
                     FROM push_tasks t
                     LEFT JOIN push_subscriptions s ON s.id = t.subscription_id
                     WHERE t.next_due_date IS NOT NULL",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                })?;
                rows.collect::<rusqlite::Result<Vec<TaskRow>>>()
            })
            .map_err(|e| DuebellError::StoreUnavailable(format!("Query tasks: {e}")))?;

        let mut tasks = Vec::new();
        for (id, name, due_raw, sub_id, sub_raw, sub_updated) in rows {
            let due_at = parse_timestamp(&due_raw)?;
            if due_at > now {
                continue;
            }
            let subscription = match (sub_id, sub_raw, sub_updated) {
                (Some(sub_id), Some(raw), Some(updated)) => {
                    Some(subscription_from_row(sub_id, Some(raw), &updated)?)
                }
                _ => None,
            };
            tasks.push(Task {
                id,
                name,
                due_at: Some(due_at),
                subscription,
            });
        }
        order_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = self
            .with_conn(|conn| {
                let mut stmt =
                    conn.prepare("SELECT id, subscription, updated_at FROM push_subscriptions")?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
                rows.collect::<rusqlite::Result<Vec<SubscriptionRow>>>()
            })
            .map_err(|e| DuebellError::StoreUnavailable(format!("Query subscriptions: {e}")))?;

        let mut subscriptions = rows
            .into_iter()
            .map(|(id, raw, updated)| subscription_from_row(id, raw, &updated))
            .collect::<Result<Vec<_>>>()?;
        order_subscriptions(&mut subscriptions);
        Ok(subscriptions)
    }
}
