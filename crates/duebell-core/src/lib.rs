//! # Duebell Core
//!
//! Shared vocabulary for the due-task push pipeline: the data model,
//! the error taxonomy, configuration loading, and the two capabilities the
//! pipeline consumes (a read-only task store and a push transport).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{DispatchConfig, DuebellConfig, StoreLocation, SubscriptionPolicy, TagMode, TitleMode, VapidConfig};
pub use error::{DuebellError, Result};
pub use traits::{PushTransport, TaskStore, TransportError, TransportErrorKind};
pub use types::{DeliveryOutcome, NotificationPayload, PushEndpoint, PushKeys, Subscription, Task};
