//! Which devices hear about a due task.
//!
//! One resolver lives for one run. Under [`SubscriptionPolicy::Broadcast`]
//! the store is queried once and the list is reused for every task.

use duebell_core::config::SubscriptionPolicy;
use duebell_core::error::{DuebellError, Result};
use duebell_core::traits::TaskStore;
use duebell_core::types::{Subscription, Task, order_subscriptions};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct SubscriptionResolver {
    policy: SubscriptionPolicy,
    store: Arc<dyn TaskStore>,
    everyone: OnceCell<Vec<Subscription>>,
}

impl SubscriptionResolver {
    pub fn new(policy: SubscriptionPolicy, store: Arc<dyn TaskStore>) -> Self {
        Self {
            policy,
            store,
            everyone: OnceCell::new(),
        }
    }

    pub fn policy(&self) -> SubscriptionPolicy {
        self.policy
    }

    /// The task's own subscription.
    pub fn linked(task: &Task) -> Result<Subscription> {
        task.subscription
            .clone()
            .ok_or_else(|| DuebellError::SubscriptionMissing(format!("task {}", task.id)))
    }

    /// Every known subscription, newest first. Fetched once per resolver.
    pub async fn all(&self) -> Result<&[Subscription]> {
        let subscriptions = self
            .everyone
            .get_or_try_init(|| async {
                let mut subscriptions = self.store.subscriptions().await?;
                order_subscriptions(&mut subscriptions);
                tracing::debug!("📇 {} subscription(s) for broadcast", subscriptions.len());
                Ok::<_, DuebellError>(subscriptions)
            })
            .await?;
        Ok(subscriptions)
    }

    /// Subscriptions to notify for `task`. An empty list means the task is
    /// skipped this run. Errors only when the store could not be read.
    pub async fn resolve(&self, task: &Task) -> Result<Vec<Subscription>> {
        match self.policy {
            SubscriptionPolicy::Linked => match Self::linked(task) {
                Ok(subscription) => Ok(vec![subscription]),
                Err(e) => {
                    tracing::warn!("⚠️ No subscription for {}: {e}", task.id);
                    Ok(Vec::new())
                }
            },
            SubscriptionPolicy::Broadcast => Ok(self.all().await?.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, subscription};
    use chrono::{Duration, Utc};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_linked_returns_exactly_the_link() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore {
            subscriptions: vec![subscription("other", now)],
            ..Default::default()
        });
        let resolver = SubscriptionResolver::new(SubscriptionPolicy::Linked, store.clone());
        let task = Task::new("t1", "Dishes", Some(now)).with_subscription(subscription("mine", now));

        let subs = resolver.resolve(&task).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, "mine");
        assert_eq!(store.subscription_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_linked_missing_is_empty() {
        let store = Arc::new(MemoryStore::default());
        let resolver = SubscriptionResolver::new(SubscriptionPolicy::Linked, store);
        let task = Task::new("t1", "Dishes", Some(Utc::now()));

        assert!(matches!(
            SubscriptionResolver::linked(&task),
            Err(DuebellError::SubscriptionMissing(_))
        ));
        assert!(resolver.resolve(&task).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_newest_first_and_cached() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore {
            subscriptions: vec![
                subscription("old", now - Duration::days(2)),
                subscription("new", now),
                subscription("mid", now - Duration::days(1)),
            ],
            ..Default::default()
        });
        let resolver = SubscriptionResolver::new(SubscriptionPolicy::Broadcast, store.clone());

        for id in ["t1", "t2", "t3"] {
            let subs = resolver.resolve(&Task::new(id, id, Some(now))).await.unwrap();
            let ids: Vec<_> = subs.iter().map(|s| s.id.as_str()).collect();
            assert_eq!(ids, ["new", "mid", "old"]);
        }
        assert_eq!(store.subscription_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broadcast_store_failure_propagates() {
        let store = Arc::new(MemoryStore {
            fail_subscriptions: true,
            ..Default::default()
        });
        let resolver = SubscriptionResolver::new(SubscriptionPolicy::Broadcast, store);
        let err = resolver.resolve(&Task::new("t1", "Dishes", Some(Utc::now()))).await;
        assert!(matches!(err, Err(DuebellError::StoreUnavailable(_))));
    }
}
