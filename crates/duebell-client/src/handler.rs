//! Push-received and notification-tap handlers.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::host::{HostError, HostPlatform, NotificationOptions, WindowClient};

/// Values used when a push carries no usable field.
#[derive(Debug, Clone)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub vibrate: Vec<u32>,
    /// Opened on tap when no app window is around.
    pub start_url: String,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "Task Reminder".into(),
            body: "A task needs your attention!".into(),
            icon: "/icons/Icon-192.png".into(),
            badge: "/icons/Icon-192.png".into(),
            tag: "duebell".into(),
            vibrate: vec![100, 50, 100],
            start_url: "/".into(),
        }
    }
}

/// What a tap ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused(String),
    Opened(String),
}

/// Stateless handler pair bound to the host's push and tap events.
#[derive(Debug, Clone)]
pub struct PushHandler {
    origin: String,
    defaults: NotificationDefaults,
}

impl PushHandler {
    /// `origin` is the app's scheme + host, e.g. `https://app.example.com`.
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            defaults: NotificationDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: NotificationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Title and options for a push body. Never fails: anything that is not
    /// a JSON object yields the defaults, and each missing or non-string
    /// field falls back on its own.
    pub fn notification_for(&self, data: Option<&[u8]>, arrived_at: DateTime<Utc>) -> (String, NotificationOptions) {
        let parsed = data.and_then(|bytes| serde_json::from_slice::<Value>(bytes).ok());
        let fields = match parsed {
            Some(Value::Object(map)) => Some(map),
            Some(_) | None => {
                tracing::debug!("📭 Push without a usable payload, showing defaults");
                None
            }
        };
        let field = |name: &str, fallback: &str| -> String {
            fields
                .as_ref()
                .and_then(|map| map.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        let title = field("title", &self.defaults.title);
        let options = NotificationOptions {
            body: field("body", &self.defaults.body),
            icon: field("icon", &self.defaults.icon),
            badge: field("badge", &self.defaults.badge),
            tag: field("tag", &self.defaults.tag),
            renotify: true,
            vibrate: self.defaults.vibrate.clone(),
            data: serde_json::json!({ "arrived_at": arrived_at.timestamp_millis() }),
        };
        (title, options)
    }

    /// Push received: show one notification keyed by the payload's tag.
    pub async fn on_push(&self, host: &dyn HostPlatform, data: Option<&[u8]>) -> Result<(), HostError> {
        let (title, options) = self.notification_for(data, Utc::now());
        tracing::debug!("🔔 Showing '{}' (tag {})", title, options.tag);
        host.show_notification(&title, &options).await
    }

    /// Notification tapped: dismiss it, then focus an app window or open one.
    pub async fn on_notification_click(&self, host: &dyn HostPlatform, tag: &str) -> Result<ClickOutcome, HostError> {
        if let Err(e) = host.close_notification(tag).await {
            tracing::warn!("⚠️ Could not close notification {tag}: {e}");
        }

        let windows = match host.windows().await {
            Ok(windows) => windows,
            Err(e) => {
                tracing::warn!("⚠️ Could not list windows: {e}");
                Vec::new()
            }
        };
        if let Some(window) = self.pick_window(&windows) {
            match host.focus(&window.id).await {
                Ok(()) => return Ok(ClickOutcome::Focused(window.id.clone())),
                Err(e) => tracing::warn!("⚠️ Focus {} failed, opening a new window: {e}", window.id),
            }
        }

        host.open_window(&self.defaults.start_url).await?;
        Ok(ClickOutcome::Opened(self.defaults.start_url.clone()))
    }

    /// Among windows of this app: the focused one, else a visible one, else the first.
    pub fn pick_window<'a>(&self, windows: &'a [WindowClient]) -> Option<&'a WindowClient> {
        let ours: Vec<&WindowClient> = windows.iter().filter(|w| self.is_same_origin(&w.url)).collect();
        ours.iter()
            .find(|w| w.focused)
            .or_else(|| ours.iter().find(|w| w.visible))
            .or_else(|| ours.first())
            .copied()
    }

    fn is_same_origin(&self, url: &str) -> bool {
        url.strip_prefix(&self.origin)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
    }
}
