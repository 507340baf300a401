use std::collections::BTreeMap;

use tokio::sync::Mutex;

use crate::domain::{ItemKey, Subscription, SubscriptionKey, UserId};
use crate::error::{Error, Result};
use crate::repo::SubscriptionStore;

/// Process-local subscription store, indexed by composite key.
/// Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: Mutex<BTreeMap<SubscriptionKey, Subscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn set_active(&self, key: &SubscriptionKey, active: bool) -> Result<()> {
        let mut subscriptions = self.subscriptions.lock().await;

        let subscription = subscriptions
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.clone()))?;
        subscription.active = active;

        Ok(())
    }

    async fn collect<P>(&self, predicate: P) -> Vec<Subscription>
    where
        P: Fn(&Subscription) -> bool,
    {
        self.subscriptions
            .lock()
            .await
            .values()
            .filter(|subscription| predicate(*subscription))
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    #[tracing::instrument(name = "Insert subscription in memory", skip(self))]
    async fn create_subscription(&self, subscription: &Subscription) -> Result<bool> {
        use std::collections::btree_map::Entry;

        match self.subscriptions.lock().await.entry(subscription.key()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(subscription.clone());
                Ok(true)
            }
        }
    }

    #[tracing::instrument(name = "Disable subscription in memory", skip(self))]
    async fn disable_subscription(&self, key: &SubscriptionKey) -> Result<()> {
        self.set_active(key, false).await
    }

    #[tracing::instrument(name = "Enable subscription in memory", skip(self))]
    async fn enable_subscription(&self, key: &SubscriptionKey) -> Result<()> {
        self.set_active(key, true).await
    }

    #[tracing::instrument(name = "Remove subscription from memory", skip(self))]
    async fn remove_subscription(&self, key: &SubscriptionKey) -> Result<bool> {
        Ok(self.subscriptions.lock().await.remove(key).is_some())
    }

    async fn read_subscriptions(&self) -> Result<Vec<Subscription>> {
        Ok(self.collect(|subscription| subscription.active).await)
    }

    async fn read_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        Ok(self.collect(|_| true).await)
    }

    async fn read_user_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        Ok(self
            .collect(|subscription| subscription.active && &subscription.user.id == user_id)
            .await)
    }

    async fn read_user_all_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        Ok(self
            .collect(|subscription| &subscription.user.id == user_id)
            .await)
    }

    async fn read_subscriptions_by_shop_item(&self, item: &ItemKey) -> Result<Vec<Subscription>> {
        Ok(self
            .collect(|subscription| {
                subscription.active
                    && subscription.shop_item.article == item.article
                    && subscription.shop_item.size_id == item.size_id
            })
            .await)
    }
}
