//! # Duebell Client
//!
//! The device side of a reminder: turn an incoming push into a system
//! notification, and bring the app forward when the notification is tapped.
//!
//! Both handlers are stateless. Everything they need arrives with the event
//! or is asked of the [`HostPlatform`], so overlapping events and a cold
//! start (app not running when the push lands) need no special handling.

pub mod handler;
pub mod host;

pub use handler::{ClickOutcome, NotificationDefaults, PushHandler};
pub use host::{HostError, HostPlatform, NotificationOptions, WindowClient};
