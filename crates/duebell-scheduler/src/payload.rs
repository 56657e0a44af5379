//! Notification payload construction.

use duebell_core::config::{DispatchConfig, TagMode, TitleMode};
use duebell_core::types::{NotificationPayload, Task};

/// Builds the user-visible payload for a due task.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    title_mode: TitleMode,
    tag_mode: TagMode,
    title: String,
    body_prefix: String,
    icon: Option<String>,
    badge: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl PayloadBuilder {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            title_mode: config.title_mode,
            tag_mode: config.tag_mode,
            title: config.title.clone(),
            body_prefix: config.body_prefix.clone(),
            icon: non_empty(&config.icon),
            badge: non_empty(&config.badge),
        }
    }

    /// Payload for `task`. Always carries a tag, so a device holds at most
    /// one banner per task.
    pub fn build(&self, task: &Task) -> NotificationPayload {
        let title = match self.title_mode {
            TitleMode::Fixed => self.title.clone(),
            TitleMode::TaskName => task.name.clone(),
        };
        NotificationPayload {
            title,
            body: format!("{}: {}", self.body_prefix, task.name),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            tag: Some(self.tag_for(task)),
        }
    }

    pub fn tag_for(&self, task: &Task) -> String {
        match (self.tag_mode, task.due_at) {
            (TagMode::TaskIdAndDue, Some(due)) => format!("{}@{}", task.id, due.timestamp()),
            _ => task.id.clone(),
        }
    }
}
