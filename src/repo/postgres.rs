use std::future::Future;
use std::time::Duration;

use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};

use crate::domain::{ItemKey, ShopItem, Subscription, SubscriptionKey, User, UserId};
use crate::error::{Error, Result};
use crate::repo::SubscriptionStore;

/// Default upper bound for a single store operation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Postgres subscription store.
/// The composite primary key `(user_id, article, size_id)` enforces uniqueness,
/// so concurrent creators of the same key cannot both succeed.
#[derive(Debug, Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Run a query, giving up once the store timeout has elapsed
    async fn bounded<T, F>(&self, query: F) -> Result<T>
    where
        F: Future<Output = sqlx::Result<T>>,
    {
        tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
            .map_err(Error::from)
    }

    async fn set_active(&self, key: &SubscriptionKey, active: bool) -> Result<()> {
        let result = self
            .bounded(
                sqlx::query(
                    "update subscriptions set active=$4, updated_at=now() \
                     where user_id=$1 and article=$2 and size_id=$3",
                )
                .bind(key.user_id.as_ref())
                .bind(key.article.as_ref())
                .bind(key.size_id.value())
                .bind(active)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(key.clone()));
        }
        Ok(())
    }

    async fn fetch(
        &self,
        query: QueryAs<'_, Postgres, SubscriptionRow, PgArguments>,
    ) -> Result<Vec<Subscription>> {
        let rows = self.bounded(query.fetch_all(&self.pool)).await?;

        rows.into_iter()
            .map(SubscriptionRow::into_subscription)
            .collect()
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    #[tracing::instrument(name = "Insert subscription", skip(self))]
    async fn create_subscription(&self, subscription: &Subscription) -> Result<bool> {
        let item = &subscription.shop_item;
        let result = self
            .bounded(
                sqlx::query(
                    "insert into subscriptions(user_id, article, size_id, description, size_label, url, active) \
                     values ($1, $2, $3, $4, $5, $6, $7) \
                     on conflict (user_id, article, size_id) do nothing",
                )
                .bind(subscription.user.id.as_ref())
                .bind(item.article.as_ref())
                .bind(item.size_id.value())
                .bind(item.description.as_str())
                .bind(item.size_label.as_str())
                .bind(item.url.as_str())
                .bind(subscription.active)
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Disable subscription", skip(self))]
    async fn disable_subscription(&self, key: &SubscriptionKey) -> Result<()> {
        self.set_active(key, false).await
    }

    #[tracing::instrument(name = "Enable subscription", skip(self))]
    async fn enable_subscription(&self, key: &SubscriptionKey) -> Result<()> {
        self.set_active(key, true).await
    }

    #[tracing::instrument(name = "Remove subscription", skip(self))]
    async fn remove_subscription(&self, key: &SubscriptionKey) -> Result<bool> {
        let result = self
            .bounded(
                sqlx::query(
                    "delete from subscriptions where user_id=$1 and article=$2 and size_id=$3",
                )
                .bind(key.user_id.as_ref())
                .bind(key.article.as_ref())
                .bind(key.size_id.value())
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "Fetch active subscriptions", skip(self))]
    async fn read_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.fetch(sqlx::query_as(
            "select user_id, article, size_id, description, size_label, url, active \
             from subscriptions where active order by created_at",
        ))
        .await
    }

    #[tracing::instrument(name = "Fetch all subscriptions", skip(self))]
    async fn read_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.fetch(sqlx::query_as(
            "select user_id, article, size_id, description, size_label, url, active \
             from subscriptions order by created_at",
        ))
        .await
    }

    #[tracing::instrument(name = "Fetch active subscriptions of a user", skip(self))]
    async fn read_user_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        self.fetch(
            sqlx::query_as(
                "select user_id, article, size_id, description, size_label, url, active \
                 from subscriptions where user_id=$1 and active order by created_at",
            )
            .bind(user_id.as_ref()),
        )
        .await
    }

    #[tracing::instrument(name = "Fetch all subscriptions of a user", skip(self))]
    async fn read_user_all_subscriptions(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        self.fetch(
            sqlx::query_as(
                "select user_id, article, size_id, description, size_label, url, active \
                 from subscriptions where user_id=$1 order by created_at",
            )
            .bind(user_id.as_ref()),
        )
        .await
    }

    #[tracing::instrument(name = "Fetch active subscriptions of a shop item", skip(self))]
    async fn read_subscriptions_by_shop_item(&self, item: &ItemKey) -> Result<Vec<Subscription>> {
        self.fetch(
            sqlx::query_as(
                "select user_id, article, size_id, description, size_label, url, active \
                 from subscriptions where article=$1 and size_id=$2 and active order by created_at",
            )
            .bind(item.article.as_ref())
            .bind(item.size_id.value()),
        )
        .await
    }
}

/// Stored subscription record
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    user_id: String,
    article: String,
    size_id: i32,
    description: String,
    size_label: String,
    url: String,
    active: bool,
}

impl SubscriptionRow {
    /// Parse a stored record back into domain objects
    fn into_subscription(self) -> Result<Subscription> {
        let mut shop_item = ShopItem::new(self.article.parse()?, self.size_id.try_into()?);
        shop_item.description = self.description;
        shop_item.size_label = self.size_label;
        shop_item.url = self.url;

        Ok(Subscription {
            user: User::new(self.user_id.parse()?),
            shop_item,
            active: self.active,
        })
    }
}
