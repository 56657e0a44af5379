//! What the handlers need from the host platform.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error)]
#[error("Host platform error: {0}")]
pub struct HostError(pub String);

/// Options for a displayed notification. `tag` is the host's dedup key: a
/// second notification with the same tag replaces the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    /// Alert again when replacing a banner with the same tag.
    pub renotify: bool,
    pub vibrate: Vec<u32>,
    pub data: serde_json::Value,
}

/// An open application window as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub visible: bool,
}

#[async_trait]
pub trait HostPlatform: Send + Sync {
    async fn show_notification(&self, title: &str, options: &NotificationOptions) -> Result<(), HostError>;

    async fn close_notification(&self, tag: &str) -> Result<(), HostError>;

    /// Every open window, including ones not yet controlled by the handler.
    async fn windows(&self) -> Result<Vec<WindowClient>, HostError>;

    async fn focus(&self, window_id: &str) -> Result<(), HostError>;

    async fn open_window(&self, url: &str) -> Result<(), HostError>;
}
