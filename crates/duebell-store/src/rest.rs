//! PostgREST / Supabase backend.
//!
//! Reads `push_tasks` with its linked row from `push_subscriptions` embedded,
//! and `push_subscriptions` on its own for broadcast runs.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use duebell_core::error::{DuebellError, Result};
use duebell_core::traits::TaskStore;
use duebell_core::types::{Subscription, Task, order_subscriptions, order_tasks};
use serde::Deserialize;
use std::time::Duration;

use crate::parse_timestamp;

pub const TASKS_TABLE: &str = "push_tasks";
pub const SUBSCRIPTIONS_TABLE: &str = "push_subscriptions";

/// PostgREST-backed task store.
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    embed_link: bool,
}

impl RestStore {
    /// `base_url` is the project URL; `/rest/v1` is appended.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DuebellError::StoreUnavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            embed_link: true,
        })
    }

    /// Whether task rows embed their linked `push_subscriptions` row. Off for
    /// broadcast deployments, whose schema has no task → subscription relation.
    pub fn with_embedded_link(mut self, embed_link: bool) -> Self {
        self.embed_link = embed_link;
        self
    }

    fn task_columns(&self) -> String {
        if self.embed_link {
            format!("task_id,task_name,next_due_date,{SUBSCRIPTIONS_TABLE}(*)")
        } else {
            "task_id,task_name,next_due_date".to_string()
        }
    }

    async fn get_rows(&self, table: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let url = format!("{}/rest/v1/{table}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| DuebellError::StoreUnavailable(format!("{table} query failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DuebellError::StoreUnavailable(format!(
                "{table} query returned {status}: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| DuebellError::StoreUnavailable(format!("{table} response not JSON: {e}")))
    }
}

#[async_trait]
impl TaskStore for RestStore {
    fn name(&self) -> &str {
        "postgrest"
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let rows = self
            .get_rows(
                TASKS_TABLE,
                &[
                    ("select", self.task_columns()),
                    (
                        "next_due_date",
                        format!("lte.{}", now.to_rfc3339_opts(SecondsFormat::Millis, true)),
                    ),
                    ("next_due_date", "not.is.null".to_string()),
                    ("order", "next_due_date.asc,task_id.asc".to_string()),
                ],
            )
            .await?;
        decode_tasks(rows)
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows = self
            .get_rows(
                SUBSCRIPTIONS_TABLE,
                &[
                    ("select", "id,subscription,updated_at".to_string()),
                    ("order", "updated_at.desc,id.asc".to_string()),
                ],
            )
            .await?;
        let rows: Vec<SubscriptionRow> = serde_json::from_value(rows).map_err(|e| {
            DuebellError::StoreUnavailable(format!("Malformed {SUBSCRIPTIONS_TABLE} rows: {e}"))
        })?;
        let mut subscriptions = rows
            .into_iter()
            .map(SubscriptionRow::into_subscription)
            .collect::<Result<Vec<_>>>()?;
        order_subscriptions(&mut subscriptions);
        Ok(subscriptions)
    }
}

#[derive(Debug, Deserialize)]
struct TaskRow {
    task_id: serde_json::Value,
    task_name: String,
    next_due_date: Option<String>,
    #[serde(default, rename = "push_subscriptions")]
    subscription: Option<Embedded>,
}

/// The embedded relation is an object for a to-one link and an array otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Embedded {
    One(SubscriptionRow),
    Many(Vec<SubscriptionRow>),
}

#[derive(Debug, Deserialize)]
struct SubscriptionRow {
    id: serde_json::Value,
    #[serde(default)]
    subscription: serde_json::Value,
    #[serde(default)]
    updated_at: Option<String>,
}

impl SubscriptionRow {
    fn into_subscription(self) -> Result<Subscription> {
        let updated_at = match &self.updated_at {
            Some(raw) => parse_timestamp(raw)?,
            None => DateTime::<Utc>::MIN_UTC,
        };
        Ok(Subscription {
            id: id_string(&self.id)?,
            descriptor: self.subscription,
            updated_at,
        })
    }
}

/// Primary keys may be text, uuid or integer columns.
fn id_string(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(DuebellError::StoreUnavailable(format!(
            "Unexpected id value: {other}"
        ))),
    }
}

fn decode_tasks(rows: serde_json::Value) -> Result<Vec<Task>> {
    let rows: Vec<TaskRow> = serde_json::from_value(rows)
        .map_err(|e| DuebellError::StoreUnavailable(format!("Malformed {TASKS_TABLE} rows: {e}")))?;

    let mut tasks = Vec::with_capacity(rows.len());
    for row in rows {
        let due_at = row.next_due_date.as_deref().map(parse_timestamp).transpose()?;
        // A linked row without a descriptor is no subscription at all.
        let subscription = match row.subscription {
            Some(Embedded::One(sub)) if !sub.subscription.is_null() => Some(sub.into_subscription()?),
            Some(Embedded::Many(subs)) => {
                let mut subs = subs
                    .into_iter()
                    .filter(|s| !s.subscription.is_null())
                    .map(SubscriptionRow::into_subscription)
                    .collect::<Result<Vec<_>>>()?;
                order_subscriptions(&mut subs);
                subs.into_iter().next()
            }
            _ => None,
        };

        tasks.push(Task {
            id: id_string(&row.task_id)?,
            name: row.task_name,
            due_at,
            subscription,
        });
    }
    order_tasks(&mut tasks);
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_embedded_object() {
        let rows = serde_json::json!([{
            "task_id": 7,
            "task_name": "Bathroom",
            "next_due_date": "2026-03-01T09:00:00+00:00",
            "push_subscriptions": {
                "id": "s1",
                "subscription": "{\"endpoint\":\"https://push.example.com/1\"}",
                "updated_at": "2026-02-01T00:00:00+00:00"
            }
        }]);
        let tasks = decode_tasks(rows).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "7");
        let sub = tasks[0].subscription.as_ref().unwrap();
        assert_eq!(sub.id, "s1");
        assert!(sub.descriptor.is_string());
    }

    #[test]
    fn test_decode_missing_or_empty_link() {
        let rows = serde_json::json!([
            {"task_id": "a", "task_name": "A", "next_due_date": "2026-03-01T09:00:00Z", "push_subscriptions": null},
            {"task_id": "b", "task_name": "B", "next_due_date": "2026-03-01T09:00:00Z",
             "push_subscriptions": {"id": "s1", "subscription": null, "updated_at": null}}
        ]);
        let tasks = decode_tasks(rows).unwrap();
        assert!(tasks.iter().all(|t| t.subscription.is_none()));
    }

    #[test]
    fn test_decode_array_takes_newest() {
        let rows = serde_json::json!([{
            "task_id": "a", "task_name": "A", "next_due_date": "2026-03-01T09:00:00Z",
            "push_subscriptions": [
                {"id": "old", "subscription": {}, "updated_at": "2026-01-01T00:00:00Z"},
                {"id": "new", "subscription": {}, "updated_at": "2026-02-01T00:00:00Z"}
            ]
        }]);
        let tasks = decode_tasks(rows).unwrap();
        assert_eq!(tasks[0].subscription.as_ref().unwrap().id, "new");
    }

    #[test]
    fn test_decode_rejects_malformed_rows() {
        assert!(matches!(
            decode_tasks(serde_json::json!({"message": "not a list"})),
            Err(DuebellError::StoreUnavailable(_))
        ));
        assert!(matches!(
            decode_tasks(serde_json::json!([{"task_id": "a", "task_name": "A", "next_due_date": "soon"}])),
            Err(DuebellError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_decode_orders_by_due_then_id() {
        let rows = serde_json::json!([
            {"task_id": "b", "task_name": "B", "next_due_date": "2026-03-01T09:00:00Z"},
            {"task_id": "c", "task_name": "C", "next_due_date": "2026-02-01T09:00:00Z"},
            {"task_id": "a", "task_name": "A", "next_due_date": "2026-03-01T09:00:00Z"}
        ]);
        let ids: Vec<_> = decode_tasks(rows).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }
}
