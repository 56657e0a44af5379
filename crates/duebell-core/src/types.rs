//! Data model — tasks, subscriptions, payloads and delivery outcomes.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DuebellError, Result};

/// A recurring task as read from the task store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// When the task next becomes due. `None` = never due.
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    /// Subscription linked one-to-one to this task (linked policy only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

impl Task {
    pub fn new(id: &str, name: &str, due_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            due_at,
            subscription: None,
        }
    }

    /// Attach the task's linked subscription.
    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// A task is due once its due timestamp has elapsed. Tasks without one never are.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at.is_some_and(|due| due <= now)
    }
}

/// A device/browser push subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    /// Opaque endpoint descriptor. Either the JSON object a browser hands out
    /// from `PushSubscription.toJSON()` or a string containing that JSON.
    pub descriptor: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(id: &str, descriptor: serde_json::Value, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            descriptor,
            updated_at,
        }
    }

    /// Deserialize the opaque descriptor into a push endpoint.
    pub fn endpoint(&self) -> Result<PushEndpoint> {
        PushEndpoint::from_descriptor(&self.descriptor)
    }
}

/// Encryption keys of a push endpoint (base64url, as issued by the browser).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A structurally valid push endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEndpoint {
    pub endpoint: String,
    pub keys: PushKeys,
}

/// Uncompressed P-256 point: 0x04 || X || Y.
const P256_PUBLIC_KEY_LEN: usize = 65;
const AUTH_SECRET_LEN: usize = 16;

impl PushEndpoint {
    /// Parse and validate a subscription descriptor.
    pub fn from_descriptor(descriptor: &serde_json::Value) -> Result<Self> {
        let parsed: Self = match descriptor {
            serde_json::Value::String(raw) => serde_json::from_str(raw),
            other => serde_json::from_value(other.clone()),
        }
        .map_err(|e| DuebellError::SubscriptionDescriptorInvalid(format!("Malformed descriptor: {e}")))?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.endpoint).map_err(|e| {
            DuebellError::SubscriptionDescriptorInvalid(format!("Endpoint is not a URL: {e}"))
        })?;
        if url.scheme() != "https" {
            return Err(DuebellError::SubscriptionDescriptorInvalid(format!(
                "Endpoint must use https, got {}",
                url.scheme()
            )));
        }

        let p256dh = decode_base64url(&self.keys.p256dh).ok_or_else(|| {
            DuebellError::SubscriptionDescriptorInvalid("p256dh key is not base64url".into())
        })?;
        if p256dh.len() != P256_PUBLIC_KEY_LEN || p256dh[0] != 0x04 {
            return Err(DuebellError::SubscriptionDescriptorInvalid(format!(
                "p256dh key must be an uncompressed P-256 point, got {} bytes",
                p256dh.len()
            )));
        }

        let auth = decode_base64url(&self.keys.auth).ok_or_else(|| {
            DuebellError::SubscriptionDescriptorInvalid("auth secret is not base64url".into())
        })?;
        if auth.len() != AUTH_SECRET_LEN {
            return Err(DuebellError::SubscriptionDescriptorInvalid(format!(
                "auth secret must be {AUTH_SECRET_LEN} bytes, got {}",
                auth.len()
            )));
        }
        Ok(())
    }
}

/// Decode base64url, tolerating padding and the standard alphabet.
pub fn decode_base64url(value: &str) -> Option<Vec<u8>> {
    let normalized: String = value
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    if normalized.is_empty() {
        return None;
    }
    URL_SAFE_NO_PAD.decode(normalized.as_bytes()).ok()
}

/// Notification payload sent over the push transport.
///
/// Wire shape: `{ title, body, icon?, badge?, tag? }`. The `tag` is the
/// device-side dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl NotificationPayload {
    /// Serialize to the JSON bytes handed to the transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Result of one (task, subscription) send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    TransientFailure { reason: String },
    PermanentInvalid { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::PermanentInvalid { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::TransientFailure { .. } => "transient_failure",
            Self::PermanentInvalid { .. } => "permanent_invalid",
        }
    }
}

/// Stable task ordering: earliest due first, then by ID.
pub fn order_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)));
}

/// Broadcast ordering: most recently updated first, then by ID.
pub fn order_subscriptions(subscriptions: &mut [Subscription]) {
    subscriptions.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
