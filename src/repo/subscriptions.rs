use crate::domain::{ItemKey, Subscription, SubscriptionKey, UserId};
use crate::error::Result;

/// Subscription store, implemented once per storage backend.
/// Every backend enforces the same contract:
/// - at most one record per `SubscriptionKey`, whatever its `active` flag
/// - "active" reads only return records with `active == true`
/// - `Error::NotFound` when enabling or disabling a missing key
/// TODO: Swap async-trait for std async traits once they support `dyn` dispatch
#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert a new subscription.
    /// Returns `false`, not an error, when a record with the same key already exists
    async fn create_subscription(&self, subscription: &Subscription) -> Result<bool>;

    /// Mark an existing subscription inactive
    async fn disable_subscription(&self, key: &SubscriptionKey) -> Result<()>;

    /// Mark an existing subscription active
    async fn enable_subscription(&self, key: &SubscriptionKey) -> Result<()>;

    /// Delete a subscription. Returns `false` when no record had the key
    async fn remove_subscription(&self, key: &SubscriptionKey) -> Result<bool>;

    /// All active subscriptions of all users
    async fn read_subscriptions(&self) -> Result<Vec<Subscription>>;

    /// All subscriptions of all users, active or not
    async fn read_all_subscriptions(&self) -> Result<Vec<Subscription>>;

    /// Active subscriptions of a single user
    async fn read_user_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>>;

    /// All subscriptions of a single user, active or not
    async fn read_user_all_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>>;

    /// Active subscriptions watching the given (article, size)
    async fn read_subscriptions_by_shop_item(&self, item: &ItemKey) -> Result<Vec<Subscription>>;
}
