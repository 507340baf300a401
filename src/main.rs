use std::sync::Arc;

use anyhow::Context;

use sqlx::PgPool;

use stock_watch::client::CatalogClient;
use stock_watch::mediator::Mediator;
use stock_watch::poller::Poller;
use stock_watch::repo::{MemorySubscriptionStore, PgSubscriptionStore, SubscriptionStore};
use stock_watch::settings::{Settings, StorageDriver, StorageSettings};
use stock_watch::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    let subscriber = telemetry::create_subscriber(&settings.log_filter, std::io::stdout);
    telemetry::set_subscriber(subscriber)?;

    let catalog = Arc::new(CatalogClient::new(
        settings.catalog.base_url()?,
        settings.catalog.language(),
        settings.catalog.timeout(),
    )?);
    let store = connect_store(&settings.storage).await?;

    let poller = Arc::new(Poller::new(
        catalog.clone(),
        settings.poller.interval(),
        settings.poller.max_concurrent_fetches,
        settings.poller.snapshot_buffer,
    ));
    let (mediator, mut notifications) = Mediator::new(
        store,
        catalog,
        poller.clone(),
        settings.mediator.notification_buffer,
    );
    let mediator = Arc::new(mediator);

    mediator
        .restore_watch_list()
        .await
        .context("Failed to restore watch-list")?;

    // No chat front end here, notifications only reach the log
    let sink = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            tracing::info!(
                user = %notification.user.id,
                item = %notification.shop_item.key(),
                url = %notification.shop_item.url,
                "{} is in stock: {}",
                notification.shop_item.description,
                notification.snapshot
            );
        }
    });

    let snapshots = poller.start()?;
    mediator.start(snapshots)?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");

    poller.stop().await;
    mediator.stop().await;
    sink.await.context("Notification sink failed")?;

    Ok(())
}

async fn connect_store(settings: &StorageSettings) -> anyhow::Result<Arc<dyn SubscriptionStore>> {
    match settings.driver {
        StorageDriver::Memory => {
            tracing::warn!("Using the in-memory store, subscriptions are lost on exit");
            Ok(Arc::new(MemorySubscriptionStore::new()))
        }
        StorageDriver::Postgres => {
            let database = settings
                .database
                .as_ref()
                .context("The postgres driver requires database settings")?;

            let pool = PgPool::connect_with(database.with_db())
                .await
                .context("Failed to connect to Postgres")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            Ok(Arc::new(PgSubscriptionStore::new(pool, settings.timeout())))
        }
    }
}
