use std::time::Duration;

use chrono::Utc;

use reqwest::{Client, StatusCode};

use serde::Deserialize;
use serde_aux::prelude::*;

use url::Url;

use crate::client::Catalog;
use crate::domain::{Article, ItemDetails, SizeId, StockSnapshot};
use crate::error::{Error, Result};

const EXTENDED_OPTIONS_ENDPOINT: &str = "itemstock/getextendedoptions/";
const SEARCH_ENDPOINT: &str = "search";

/// REST client for the shop catalog
#[derive(Debug)]
pub struct CatalogClient {
    client: Client,
    /// `{base_url}/{language}/`, the root all endpoints are resolved against
    api_root: Url,
}

impl CatalogClient {
    pub fn new(api_base_url: Url, language: &str, api_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(api_timeout).build()?;

        let api_root = api_base_url.join(&format!("{}/", language.trim_matches('/')))?;

        Ok(Self { client, api_root })
    }
}

#[async_trait::async_trait]
impl Catalog for CatalogClient {
    #[tracing::instrument(name = "Fetch catalog item details", skip(self))]
    async fn item_details(&self, article: &Article) -> Result<ItemDetails> {
        let url = self
            .api_root
            .join(EXTENDED_OPTIONS_ENDPOINT)
            .and_then(|endpoint| endpoint.join(article.as_ref()))
            .map_err(|e| Error::CatalogResponse(format!("Invalid endpoint URL: {}", e)))?;

        // The catalog caches aggressively, the timestamp busts it
        let response: ExtendedOptionsResponse = self
            .client
            .get(url)
            .query(&[("_", Utc::now().timestamp())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.into_details(article))
    }

    #[tracing::instrument(name = "Resolve catalog item URL", skip(self))]
    async fn item_url_by_article(&self, article: &Article) -> Result<Url> {
        let url = self
            .api_root
            .join(SEARCH_ENDPOINT)
            .map_err(|e| Error::CatalogResponse(format!("Invalid endpoint URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .query(&[("w", article.as_ref())])
            .send()
            .await?;

        // The search redirects to the product page, which marks the article in the fragment
        let final_url = response.url();
        if response.status() == StatusCode::OK && final_url.fragment() == Some(article.as_ref()) {
            return Ok(final_url.clone());
        }

        Err(Error::CatalogResponse(format!(
            "Search for {} did not resolve to a product page (status {}, url {})",
            article,
            response.status(),
            final_url
        )))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExtendedOptionsResponse {
    #[serde(default)]
    description: String,
    #[serde(default)]
    options: Vec<OptionResponse>,
}

#[derive(Debug, Deserialize)]
struct OptionResponse {
    #[serde(rename = "OptionName", default)]
    name: String,
    #[serde(rename = "OptionNumber", deserialize_with = "deserialize_number_from_string")]
    number: i32,
    #[serde(rename = "Price", default)]
    price: String,
    #[serde(rename = "StockStatus", default)]
    stock_status: String,
}

impl ExtendedOptionsResponse {
    fn into_details(self, article: &Article) -> ItemDetails {
        let options = self
            .options
            .into_iter()
            .filter_map(|option| match SizeId::try_from(option.number) {
                Ok(size_id) => Some(StockSnapshot {
                    article: article.clone(),
                    size_id,
                    status: option.stock_status.as_str().into(),
                    name: option.name,
                    price: option.price,
                }),
                Err(e) => {
                    tracing::warn!("Skipping catalog option of {}: {}", article, e);
                    None
                }
            })
            .collect();

        ItemDetails {
            description: self.description,
            options,
        }
    }
}
