use std::sync::Arc;

use parking_lot::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use tokio_util::sync::CancellationToken;

use crate::client::Catalog;
use crate::domain::{
    Article, ItemKey, Notification, ShopItem, StockSnapshot, Subscription, SubscriptionKey, UserId,
};
use crate::error::{Error, Result};
use crate::poller::Poller;
use crate::repo::SubscriptionStore;

/// Correlates stock snapshots with subscriptions.
///
/// Every in-stock snapshot notifies each active subscriber of that (article, size)
/// once, then disables their subscription. The poller only watches items that
/// still have an active subscription: subscribing or enabling adds the item,
/// and once no active subscription remains the item is dropped from the watch-list.
pub struct Mediator {
    store: Arc<dyn SubscriptionStore>,
    catalog: Arc<dyn Catalog>,
    poller: Arc<Poller>,
    /// Serializes store writes with the watch-list updates that follow them
    watch_lock: tokio::sync::Mutex<()>,
    notifications: Mutex<Option<mpsc::Sender<Notification>>>,
    /// Stop once the buffered snapshots are handled
    shutdown: CancellationToken,
    /// Stop right away, dropping buffered snapshots
    abort: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Mediator {
    /// Create a mediator and the receiving end of its notification stream.
    /// Sending blocks once `notification_buffer` notifications are waiting.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        catalog: Arc<dyn Catalog>,
        poller: Arc<Poller>,
        notification_buffer: usize,
    ) -> (Self, mpsc::Receiver<Notification>) {
        let (notifications, receiver) = mpsc::channel(notification_buffer.max(1));

        let mediator = Self {
            store,
            catalog,
            poller,
            watch_lock: tokio::sync::Mutex::new(()),
            notifications: Mutex::new(Some(notifications)),
            shutdown: CancellationToken::new(),
            abort: CancellationToken::new(),
            task: Mutex::new(None),
        };

        (mediator, receiver)
    }

    /// Store a new subscription and start watching its item.
    /// Returns `false` if the user is already subscribed to that item, active or not.
    #[tracing::instrument(name = "Create subscription", skip(self, subscription), fields(key = %subscription.key()))]
    pub async fn create_subscription(&self, subscription: Subscription) -> Result<bool> {
        let mut subscription = subscription;
        subscription.active = true;
        self.enrich(&mut subscription.shop_item).await;

        let _guard = self.watch_lock.lock().await;
        let created = self.store.create_subscription(&subscription).await?;
        if created {
            self.poller.add_item(&subscription.shop_item.key());
        } else {
            tracing::info!("Subscription already exists");
        }

        Ok(created)
    }

    /// Delete a subscription. Returns `false` if there was nothing to delete
    #[tracing::instrument(name = "Remove subscription", skip(self))]
    pub async fn remove_subscription(&self, key: &SubscriptionKey) -> Result<bool> {
        let _guard = self.watch_lock.lock().await;
        let removed = self.store.remove_subscription(key).await?;
        if removed {
            self.prune_locked(&key.item_key()).await;
        }

        Ok(removed)
    }

    #[tracing::instrument(name = "Enable subscription", skip(self))]
    pub async fn enable_subscription(&self, key: &SubscriptionKey) -> Result<()> {
        let _guard = self.watch_lock.lock().await;
        self.store.enable_subscription(key).await?;
        self.poller.add_item(&key.item_key());

        Ok(())
    }

    #[tracing::instrument(name = "Disable subscription", skip(self))]
    pub async fn disable_subscription(&self, key: &SubscriptionKey) -> Result<()> {
        self.store.disable_subscription(key).await?;
        self.prune(&key.item_key()).await;

        Ok(())
    }

    pub async fn read_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.store.read_subscriptions().await
    }

    pub async fn read_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.store.read_all_subscriptions().await
    }

    pub async fn read_user_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        self.store.read_user_subscriptions(user_id).await
    }

    pub async fn read_user_all_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        self.store.read_user_all_subscriptions(user_id).await
    }

    /// Current stock of every size of an article, e.g. to offer a choice of sizes
    pub async fn options_by_article(&self, article: &Article) -> Result<Vec<StockSnapshot>> {
        self.catalog.options_by_article(article).await
    }

    /// Watch the item of every active subscription.
    /// Returns the number of items that were not watched yet.
    #[tracing::instrument(name = "Restore watch-list", skip(self))]
    pub async fn restore_watch_list(&self) -> Result<usize> {
        let _guard = self.watch_lock.lock().await;
        let restored = self
            .store
            .read_subscriptions()
            .await?
            .iter()
            .filter(|subscription| self.poller.add_item(&subscription.shop_item.key()))
            .count();

        tracing::info!("Restored {} watched items", restored);
        Ok(restored)
    }

    /// Start consuming stock snapshots
    pub fn start(self: &Arc<Self>, snapshots: mpsc::Receiver<StockSnapshot>) -> Result<()> {
        let notifications = self
            .notifications
            .lock()
            .take()
            .ok_or(Error::AlreadyStarted("Mediator"))?;

        let mediator = Arc::clone(self);
        let task = tokio::spawn(async move { mediator.run(snapshots, notifications).await });
        *self.task.lock() = Some(task);

        Ok(())
    }

    /// Handle every snapshot already buffered in the stream, then stop.
    /// Call after `Poller::stop` so nothing new arrives while draining.
    /// The notification stream is closed once this returns.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        self.join().await;
    }

    /// Stop without handling buffered snapshots, giving up on a blocked notification.
    /// Notifications that were not sent leave their subscription active.
    pub async fn abort(&self) {
        self.abort.cancel();
        self.join().await;
    }

    async fn join(&self) {
        // Never started: close the notification stream here
        self.notifications.lock().take();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("Mediator task failed: {}", e);
            }
            tracing::info!("Mediator stopped");
        }
    }

    async fn run(
        &self,
        mut snapshots: mpsc::Receiver<StockSnapshot>,
        notifications: mpsc::Sender<Notification>,
    ) {
        loop {
            // Buffered snapshots win over a graceful shutdown, so the stream is drained first
            let snapshot = tokio::select! {
                biased;
                _ = self.abort.cancelled() => break,
                snapshot = snapshots.recv() => match snapshot {
                    Some(snapshot) => snapshot,
                    None => {
                        tracing::info!("Snapshot stream closed");
                        break;
                    }
                },
                _ = self.shutdown.cancelled() => break,
            };

            self.handle_snapshot(snapshot, &notifications).await;
        }
    }

    #[tracing::instrument(name = "Handle stock snapshot", skip_all, fields(item = %snapshot.key(), status = %snapshot.status))]
    async fn handle_snapshot(
        &self,
        snapshot: StockSnapshot,
        notifications: &mpsc::Sender<Notification>,
    ) {
        let item = snapshot.key();

        if snapshot.is_in_stock() {
            let matched = match self.store.read_subscriptions_by_shop_item(&item).await {
                Ok(matched) => matched,
                Err(e) => {
                    tracing::error!("Failed to read subscriptions: {}", e);
                    return;
                }
            };

            for subscription in matched {
                let key = subscription.key();
                let notification = Notification {
                    user: subscription.user,
                    shop_item: subscription.shop_item,
                    snapshot: snapshot.clone(),
                };

                // Keep the subscription active unless the notification went out
                if !self.notify(notifications, notification).await {
                    return;
                }
                if let Err(e) = self.store.disable_subscription(&key).await {
                    tracing::error!("Failed to disable notified subscription {}: {}", key, e);
                }
            }
        } else {
            tracing::debug!("Item not in stock");
        }

        self.prune(&item).await;
    }

    async fn notify(
        &self,
        notifications: &mpsc::Sender<Notification>,
        notification: Notification,
    ) -> bool {
        let user_id = notification.user.id.clone();

        tokio::select! {
            _ = self.abort.cancelled() => false,
            sent = notifications.send(notification) => match sent {
                Ok(()) => {
                    tracing::info!("Notified {}", user_id);
                    true
                }
                Err(_) => {
                    tracing::warn!("Notification sink closed, {} not notified", user_id);
                    false
                }
            },
        }
    }

    /// Fill in description, size label and URL from the catalog, as far as it answers
    async fn enrich(&self, item: &mut ShopItem) {
        match self.catalog.item_details(&item.article).await {
            Ok(details) => {
                match details.option(item.size_id) {
                    Some(option) => item.size_label = option.name.clone(),
                    None => tracing::warn!("Catalog has no size {} for {}", item.size_id, item.article),
                }
                item.description = details.description;
            }
            Err(e) => tracing::warn!("Failed to fetch details of {}: {}", item.article, e),
        }

        match self.catalog.item_url_by_article(&item.article).await {
            Ok(url) => item.url = url.into(),
            Err(e) => tracing::warn!("Failed to resolve URL of {}: {}", item.article, e),
        }
    }

    async fn prune(&self, item: &ItemKey) {
        let _guard = self.watch_lock.lock().await;
        self.prune_locked(item).await;
    }

    /// Stop watching an item nobody is subscribed to anymore
    async fn prune_locked(&self, item: &ItemKey) {
        match self.store.read_subscriptions_by_shop_item(item).await {
            Ok(active) if active.is_empty() => {
                self.poller.remove_item(item);
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Failed to check subscriptions of {}: {}", item, e),
        }
    }
}
