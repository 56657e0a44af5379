//! In-process fakes for pipeline tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duebell_core::error::{DuebellError, Result};
use duebell_core::traits::{PushTransport, TaskStore, TransportError};
use duebell_core::types::{PushEndpoint, Subscription, Task};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// RFC 8291 example user-agent keys.
pub const P256DH: &str =
    "BCVxsr7N_eNgVRqvHtD0zTZsEc6-VV-JvLexhqUzORcxaOzi6-AYWXvTBHm4bjyPjs7Vd8pZGH6SRpkNtoIAiw4";
pub const AUTH: &str = "BTBZMqHH6r4Tts7J_aSIgg";

pub fn endpoint_url(name: &str) -> String {
    format!("https://push.example.com/{name}")
}

/// A subscription whose descriptor parses to `https://push.example.com/<id>`.
pub fn subscription(id: &str, updated_at: DateTime<Utc>) -> Subscription {
    Subscription::new(
        id,
        serde_json::json!({
            "endpoint": endpoint_url(id),
            "expirationTime": null,
            "keys": { "p256dh": P256DH, "auth": AUTH }
        }),
        updated_at,
    )
}

/// A subscription whose descriptor does not parse.
pub fn broken_subscription(id: &str, updated_at: DateTime<Utc>) -> Subscription {
    Subscription::new(id, serde_json::Value::String("{\"endpoint\":".into()), updated_at)
}

/// Store fake. Returns every task it holds from `due_tasks`, leaving the
/// due filter to the finder.
#[derive(Default)]
pub struct MemoryStore {
    pub tasks: Vec<Task>,
    pub subscriptions: Vec<Subscription>,
    pub fail_tasks: bool,
    pub fail_subscriptions: bool,
    pub subscription_queries: AtomicUsize,
}

#[async_trait]
impl TaskStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn due_tasks(&self, _now: DateTime<Utc>) -> Result<Vec<Task>> {
        if self.fail_tasks {
            return Err(DuebellError::StoreUnavailable("connection refused".into()));
        }
        Ok(self.tasks.clone())
    }

    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        self.subscription_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscriptions {
            return Err(DuebellError::StoreUnavailable("connection reset".into()));
        }
        Ok(self.subscriptions.clone())
    }
}

/// How the fake transport answers for one endpoint.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Accept,
    Gone,
    Fail,
    Hang,
    Panic,
}

/// Transport fake. Accepts by default; records every call.
#[derive(Default)]
pub struct FakeTransport {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, subscription_id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(endpoint_url(subscription_id), behavior);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<u8>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send(
        &self,
        endpoint: &PushEndpoint,
        payload: &[u8],
    ) -> std::result::Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.endpoint.clone(), payload.to_vec()));
        let behavior = self
            .behaviors
            .get(&endpoint.endpoint)
            .copied()
            .unwrap_or(Behavior::Accept);
        match behavior {
            Behavior::Accept => Ok(()),
            Behavior::Gone => Err(TransportError::from_status(410, "push subscription has unsubscribed or expired")),
            Behavior::Fail => Err(TransportError::from_status(503, "service unavailable")),
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("transport blew up"),
        }
    }
}
