//! # Duebell Scheduler
//!
//! The due-task → push notification pipeline. One invocation is one short,
//! stateless run; a task stays due until its due date moves, so the next run
//! is the retry.
//!
//! ## Architecture
//! ```text
//! DispatchEngine::run(now)
//!   ├── finder      store.due_tasks(now) → stable, de-duplicated due set
//!   ├── resolver    Linked: the task's own subscription
//!   │               Broadcast: every subscription, newest first
//!   ├── payload     { title, body, icon, badge, tag = task id }
//!   ├── dispatch    one spawned send per (task, subscription), bounded,
//!   │               timed out, settled and collected
//!   └── outcome     delivered / transient_failure / permanent_invalid → RunSummary
//! ```

pub mod dispatch;
pub mod engine;
pub mod finder;
pub mod outcome;
pub mod payload;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{DeliveryDispatcher, DeliveryJob};
pub use engine::{DispatchEngine, spawn_scheduler};
pub use finder::find_due_tasks;
pub use outcome::{DeliveryReport, RunSummary, SkipReason, SkippedTask};
pub use payload::PayloadBuilder;
pub use resolver::SubscriptionResolver;
