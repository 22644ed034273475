//! Walmart open product search API.

use async_trait::async_trait;
use pricecrawl_core::{RawQuote, SourceConfig};
use reqwest::Url;
use serde::Deserialize;

use super::http::HttpSource;
use crate::adapter::{AdapterSettings, SourceAdapter};
use crate::error::{CrawlerError, SourceError};
use crate::price::{json_price_text, prefer_price};

#[derive(Debug, Deserialize)]
struct WalmartSearchResponse {
    #[serde(default)]
    items: Vec<WalmartItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalmartItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sale_price: Option<serde_json::Value>,
    #[serde(default)]
    msrp: Option<serde_json::Value>,
    #[serde(default)]
    product_url: Option<String>,
    #[serde(default)]
    thumbnail_image: Option<String>,
}

pub struct WalmartAdapter {
    http: HttpSource,
    api_key: String,
}

impl WalmartAdapter {
    /// # Errors
    ///
    /// Returns [`CrawlerError::Build`] if `base_url` is invalid or the HTTP
    /// client cannot be built.
    pub fn new(
        config: &SourceConfig,
        api_key: String,
        settings: &AdapterSettings,
    ) -> Result<Self, CrawlerError> {
        Ok(Self {
            http: HttpSource::new(config, settings)?,
            api_key,
        })
    }

    fn search_url(&self, product_name: &str) -> Url {
        let mut url = self.http.base_url.clone();
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("query", product_name)
            .append_pair("format", "json")
            .append_pair("numItems", &self.http.settings.max_results.to_string());
        url
    }

    fn map_item(&self, item: WalmartItem) -> RawQuote {
        RawQuote {
            store: self.http.store.clone(),
            title: item.name.unwrap_or_default(),
            price: prefer_price(
                json_price_text(item.sale_price.as_ref()),
                json_price_text(item.msrp.as_ref()),
            ),
            url: item.product_url,
            image_url: item.thumbnail_image,
        }
    }
}

#[async_trait]
impl SourceAdapter for WalmartAdapter {
    fn id(&self) -> &str {
        &self.http.id
    }

    fn store_name(&self) -> &str {
        &self.http.store
    }

    async fn search(&self, product_name: &str) -> Result<Vec<RawQuote>, SourceError> {
        let url = self.search_url(product_name);
        let body: WalmartSearchResponse = self
            .http
            .send_json("walmart search", |client| client.get(url.clone()))
            .await?;

        Ok(body
            .items
            .into_iter()
            .take(self.http.settings.max_results)
            .map(|item| self.map_item(item))
            .collect())
    }
}
