use std::sync::Arc;
use std::time::Duration;

use fake::faker::internet::en::Username;
use fake::Fake;

use tokio::sync::mpsc;

use url::Url;

use wiremock::matchers::*;
use wiremock::{Mock, MockServer, ResponseTemplate};

use stock_watch::client::CatalogClient;
use stock_watch::domain::{Notification, ShopItem, Subscription, User, UserId};
use stock_watch::mediator::Mediator;
use stock_watch::poller::Poller;
use stock_watch::repo::MemorySubscriptionStore;

pub const ARTICLE: &str = "111222";

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running poller and mediator over an in-memory store, with the catalog served by a mock server
pub struct TestSystem {
    pub mediator: Arc<Mediator>,
    pub poller: Arc<Poller>,
    pub catalog_server: MockServer,
    notifications: mpsc::Receiver<Notification>,
}

impl TestSystem {
    pub async fn spawn() -> Self {
        let catalog_server = MockServer::start().await;

        let catalog = {
            let api_base_url =
                Url::parse(&catalog_server.uri()).expect("Failed to parse mock server uri");
            let api_timeout = Duration::from_secs(2);

            Arc::new(
                CatalogClient::new(api_base_url, "ru", api_timeout)
                    .expect("Failed to create catalog client"),
            )
        };
        let store = Arc::new(MemorySubscriptionStore::new());

        let poller = Arc::new(Poller::new(catalog.clone(), POLL_INTERVAL, 4, 16));
        let (mediator, notifications) = Mediator::new(store, catalog, poller.clone(), 16);
        let mediator = Arc::new(mediator);

        let snapshots = poller.start().expect("Failed to start poller");
        mediator.start(snapshots).expect("Failed to start mediator");

        Self {
            mediator,
            poller,
            catalog_server,
            notifications,
        }
    }

    /// Serve the given (size, stock status) options for `ARTICLE`,
    /// at most `times` times when given
    pub async fn mount_stock(&self, sizes: &[(i32, &str)], times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(format!("/ru/itemstock/getextendedoptions/{}", ARTICLE)))
            .respond_with(ResponseTemplate::new(200).set_body_json(stock_body(sizes)));

        match times {
            Some(times) => mock.up_to_n_times(times).mount(&self.catalog_server).await,
            None => mock.mount(&self.catalog_server).await,
        }
    }

    /// Redirect searches for `ARTICLE` to its product page
    pub async fn mount_product_page(&self) {
        Mock::given(method("GET"))
            .and(path("/ru/search"))
            .and(query_param("w", ARTICLE))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("/ru/style/st1#{}", ARTICLE).as_str()),
            )
            .mount(&self.catalog_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ru/style/st1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.catalog_server)
            .await;
    }

    pub async fn next_notification(&mut self) -> Option<Notification> {
        tokio::time::timeout(WAIT_TIMEOUT, self.notifications.recv())
            .await
            .expect("Timed out waiting for a notification")
    }

    /// Whether any notification arrives within a few poll intervals
    pub async fn has_more_notifications(&mut self) -> bool {
        tokio::time::timeout(POLL_INTERVAL * 6, self.notifications.recv())
            .await
            .map(|notification| notification.is_some())
            .unwrap_or(false)
    }

    /// Poll `condition` until it holds, panicking after a while
    pub async fn wait_until<F, Fut>(&self, mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        tokio::time::timeout(WAIT_TIMEOUT, async {
            while !condition().await {
                tokio::time::sleep(POLL_INTERVAL / 5).await;
            }
        })
        .await
        .expect("Timed out waiting for condition");
    }

    pub async fn shutdown(&self) {
        self.poller.stop().await;
        self.mediator.stop().await;
    }
}

pub fn stock_body(sizes: &[(i32, &str)]) -> serde_json::Value {
    let options: Vec<_> = sizes
        .iter()
        .map(|(size_id, status)| {
            serde_json::json!({
                "OptionName": format!("{} (140cm)", size_id),
                "OptionNumber": size_id.to_string(),
                "Price": "450 UAH",
                "StockStatus": status,
            })
        })
        .collect();

    serde_json::json!({
        "Description": "Cable knit jumper",
        "Options": options,
    })
}

pub fn random_user_id() -> UserId {
    let username: String = Username().fake();
    username.parse().expect("Failed to parse user id")
}

pub fn subscription(user_id: &UserId, size_id: i32) -> Subscription {
    let item = ShopItem::new(
        ARTICLE.parse().expect("Failed to parse article"),
        size_id.try_into().expect("Failed to parse size id"),
    );

    Subscription::new(User::new(user_id.clone()), item)
}
