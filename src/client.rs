use url::Url;

use crate::domain::{Article, ItemDetails, StockSnapshot};
use crate::error::Result;

mod catalog_client;
#[cfg(test)]
pub(crate) mod stub;

pub use catalog_client::*;

/// Read access to the shop catalog.
/// NOTE: Implemented by `CatalogClient`, and by in-memory stubs in tests
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch the description of an article together with all of its size options
    async fn item_details(&self, article: &Article) -> Result<ItemDetails>;

    /// Resolve the canonical product page URL of an article
    async fn item_url_by_article(&self, article: &Article) -> Result<Url>;

    /// Fetch the current stock state of every size option of an article
    async fn options_by_article(&self, article: &Article) -> Result<Vec<StockSnapshot>> {
        Ok(self.item_details(article).await?.options)
    }
}
