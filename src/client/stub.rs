use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use url::Url;

use crate::client::Catalog;
use crate::domain::{Article, ItemDetails, SizeId, StockSnapshot, StockStatus};
use crate::error::{Error, Result};

/// In-memory catalog answering from a fixed table, optionally failing or stalling
#[derive(Default)]
pub struct StubCatalog {
    items: Mutex<HashMap<Article, ItemDetails>>,
    pub failures_left: AtomicUsize,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl StubCatalog {
    pub fn with_stock(article: &Article, sizes: &[(i32, StockStatus)]) -> Self {
        let stub = Self::default();
        for (size_id, status) in sizes {
            stub.set_status(article, *size_id, *status);
        }
        stub
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add or update one size option of an article
    pub fn set_status(&self, article: &Article, size_id: i32, status: StockStatus) {
        let mut items = self.items.lock();
        let details = items.entry(article.clone()).or_insert_with(|| ItemDetails {
            description: format!("Item {}", article),
            options: Vec::new(),
        });

        let updated = snapshot(article, size_id, status);
        match details
            .options
            .iter_mut()
            .find(|option| option.size_id == updated.size_id)
        {
            Some(option) => *option = updated,
            None => details.options.push(updated),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Catalog for StubCatalog {
    async fn item_details(&self, article: &Article) -> Result<ItemDetails> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::CatalogResponse("stubbed outage".into()));
        }

        self.items
            .lock()
            .get(article)
            .cloned()
            .ok_or_else(|| Error::CatalogResponse(format!("Unknown article {}", article)))
    }

    async fn item_url_by_article(&self, article: &Article) -> Result<Url> {
        if !self.items.lock().contains_key(article) {
            return Err(Error::CatalogResponse(format!("Unknown article {}", article)));
        }

        Url::parse(&format!("https://shop.test/style/st1#{}", article))
            .map_err(|e| Error::CatalogResponse(e.to_string()))
    }
}

pub fn snapshot(article: &Article, size_id: i32, status: StockStatus) -> StockSnapshot {
    StockSnapshot {
        article: article.clone(),
        size_id: SizeId::try_from(size_id).unwrap(),
        name: format!("Size {}", size_id),
        price: "450 UAH".into(),
        status,
    }
}
