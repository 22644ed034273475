//! Best Buy products API.
//!
//! The search term lives in the path (`/v1/products(search=milk)`), so it is
//! percent-encoded by hand rather than through `query_pairs_mut`.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use pricecrawl_core::{RawQuote, SourceConfig};
use reqwest::Url;
use serde::Deserialize;

use super::http::HttpSource;
use crate::adapter::{AdapterSettings, SourceAdapter};
use crate::error::{CrawlerError, SourceError};
use crate::price::{json_price_text, prefer_price};

#[derive(Debug, Deserialize)]
struct BestBuyResponse {
    #[serde(default)]
    products: Vec<BestBuyProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BestBuyProduct {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sale_price: Option<serde_json::Value>,
    #[serde(default)]
    regular_price: Option<serde_json::Value>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

pub struct BestBuyAdapter {
    http: HttpSource,
    api_key: String,
}

impl BestBuyAdapter {
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

    fn search_url(&self, product_name: &str) -> Result<Url, SourceError> {
        let base = self.http.base_url.as_str().trim_end_matches('/');
        let encoded = utf8_percent_encode(product_name, NON_ALPHANUMERIC);
        let raw = format!("{base}(search={encoded})");
        let mut url = Url::parse(&raw).map_err(|e| SourceError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("pageSize", &self.http.settings.max_results.to_string())
            .append_pair("format", "json");
        Ok(url)
    }

    fn map_product(&self, product: BestBuyProduct) -> RawQuote {
        RawQuote {
            store: self.http.store.clone(),
            title: product.name.unwrap_or_default(),
            price: prefer_price(
                json_price_text(product.sale_price.as_ref()),
                json_price_text(product.regular_price.as_ref()),
            ),
            url: product.url,
            image_url: product.image,
        }
    }
}

#[async_trait]
impl SourceAdapter for BestBuyAdapter {
    fn id(&self) -> &str {
        &self.http.id
    }

    fn store_name(&self) -> &str {
        &self.http.store
    }

    async fn search(&self, product_name: &str) -> Result<Vec<RawQuote>, SourceError> {
        let url = self.search_url(product_name)?;
        let body: BestBuyResponse = self
            .http
            .send_json("bestbuy search", |client| client.get(url.clone()))
            .await?;

        Ok(body
            .products
            .into_iter()
            .take(self.http.settings.max_results)
            .map(|p| self.map_product(p))
            .collect())
    }
}
