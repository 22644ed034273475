//! Target RedSky product-listing search.

use async_trait::async_trait;
use pricecrawl_core::{RawQuote, SourceConfig};
use reqwest::Url;
use serde::Deserialize;

use super::http::HttpSource;
use crate::adapter::{AdapterSettings, SourceAdapter};
use crate::error::{CrawlerError, SourceError};
use crate::price::{json_price_text, prefer_price};

const TARGET_ORIGIN: &str = "https://www.target.com";

#[derive(Debug, Default, Deserialize)]
struct TargetSearchResponse {
    #[serde(default)]
    data: Option<TargetData>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetData {
    #[serde(default)]
    search: Option<TargetSearch>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetSearch {
    #[serde(default)]
    products: Vec<TargetProduct>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetProduct {
    #[serde(default)]
    item: Option<TargetItem>,
    #[serde(default)]
    price: Option<TargetPrice>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetItem {
    #[serde(default)]
    product_description: Option<TargetDescription>,
    #[serde(default)]
    enrichment: Option<TargetEnrichment>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetDescription {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetEnrichment {
    #[serde(default)]
    buy_url: Option<String>,
    #[serde(default)]
    images: Option<TargetImages>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetImages {
    #[serde(default)]
    primary_image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TargetPrice {
    #[serde(default)]
    current_retail: Option<serde_json::Value>,
    #[serde(default)]
    reg_retail: Option<serde_json::Value>,
}

pub struct TargetAdapter {
    http: HttpSource,
    api_key: String,
}

impl TargetAdapter {
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
            .append_pair("key", &self.api_key)
            .append_pair("channel", "WEB")
            .append_pair("count", &self.http.settings.max_results.to_string())
            .append_pair("default_purchasability_filter", "true")
            .append_pair("keyword", product_name);
        url
    }

    fn map_product(&self, product: TargetProduct) -> RawQuote {
        let item = product.item.unwrap_or_default();
        let enrichment = item.enrichment.unwrap_or_default();
        let price = product.price.unwrap_or_default();

        RawQuote {
            store: self.http.store.clone(),
            title: item
                .product_description
                .and_then(|d| d.title)
                .unwrap_or_default(),
            price: prefer_price(
                json_price_text(price.current_retail.as_ref()),
                json_price_text(price.reg_retail.as_ref()),
            ),
            url: enrichment.buy_url.as_deref().map(product_link),
            image_url: enrichment.images.and_then(|i| i.primary_image_url),
        }
    }
}

fn product_link(buy_url: &str) -> String {
    if buy_url.starts_with("http://") || buy_url.starts_with("https://") {
        buy_url.to_owned()
    } else {
        format!("{TARGET_ORIGIN}{buy_url}")
    }
}

#[async_trait]
impl SourceAdapter for TargetAdapter {
    fn id(&self) -> &str {
        &self.http.id
    }

    fn store_name(&self) -> &str {
        &self.http.store
    }

    async fn search(&self, product_name: &str) -> Result<Vec<RawQuote>, SourceError> {
        let url = self.search_url(product_name);
        let body: TargetSearchResponse = self
            .http
            .send_json("target search", |client| client.get(url.clone()))
            .await?;

        let products = body
            .data
            .and_then(|d| d.search)
            .map(|s| s.products)
            .unwrap_or_default();

        Ok(products
            .into_iter()
            .take(self.http.settings.max_results)
            .map(|p| self.map_product(p))
            .collect())
    }
}
