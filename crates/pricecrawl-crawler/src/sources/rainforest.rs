//! Amazon search results through the Rainforest proxy API.

use async_trait::async_trait;
use pricecrawl_core::{RawQuote, SourceConfig};
use serde::{Deserialize, Serialize};

use super::http::HttpSource;
use crate::adapter::{AdapterSettings, SourceAdapter};
use crate::error::{CrawlerError, SourceError};
use crate::price::json_price_text;

const DEFAULT_AMAZON_DOMAIN: &str = "amazon.com";

#[derive(Debug, Serialize)]
struct RainforestRequest<'a> {
    api_key: &'a str,
    #[serde(rename = "type")]
    request_type: &'static str,
    amazon_domain: &'a str,
    search_term: &'a str,
    max_page: u32,
}

#[derive(Debug, Deserialize)]
struct RainforestResponse {
    #[serde(default)]
    search_results: Vec<RainforestResult>,
}

#[derive(Debug, Deserialize)]
struct RainforestResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price: Option<RainforestPrice>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RainforestPrice {
    #[serde(default)]
    value: Option<serde_json::Value>,
}

pub struct RainforestAdapter {
    http: HttpSource,
    api_key: String,
    amazon_domain: String,
}

impl RainforestAdapter {
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
            amazon_domain: config
                .amazon_domain
                .clone()
                .unwrap_or_else(|| DEFAULT_AMAZON_DOMAIN.to_owned()),
        })
    }

    fn map_result(&self, result: RainforestResult) -> RawQuote {
        RawQuote {
            store: self.http.store.clone(),
            title: result.title.unwrap_or_default(),
            price: json_price_text(result.price.as_ref().and_then(|p| p.value.as_ref())),
            url: result.link,
            image_url: result.image,
        }
    }
}

#[async_trait]
impl SourceAdapter for RainforestAdapter {
    fn id(&self) -> &str {
        &self.http.id
    }

    fn store_name(&self) -> &str {
        &self.http.store
    }

    async fn search(&self, product_name: &str) -> Result<Vec<RawQuote>, SourceError> {
        let request = RainforestRequest {
            api_key: &self.api_key,
            request_type: "search",
            amazon_domain: &self.amazon_domain,
            search_term: product_name,
            max_page: 1,
        };
        let body: RainforestResponse = self
            .http
            .send_json("rainforest search", |client| {
                client
                    .post(self.http.base_url.clone())
                    .bearer_auth(&self.api_key)
                    .json(&request)
            })
            .await?;

        Ok(body
            .search_results
            .into_iter()
            .take(self.http.settings.max_results)
            .map(|r| self.map_result(r))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use pricecrawl_core::SourceKind;

    use super::*;
    use crate::sources::test_source;

    #[test]
    fn amazon_domain_defaults_when_unset() {
        let config = test_source(
            "amazon",
            SourceKind::Rainforest,
            "https://api.rainforestapi.com/request",
        );
        let adapter =
            RainforestAdapter::new(&config, "key".to_owned(), &AdapterSettings::default()).unwrap();
        assert_eq!(adapter.amazon_domain, "amazon.com");
    }

    #[test]
    fn request_body_uses_wire_names() {
        let body = serde_json::to_value(RainforestRequest {
            api_key: "key",
            request_type: "search",
            amazon_domain: "amazon.co.uk",
            search_term: "kettle",
            max_page: 1,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "api_key": "key",
                "type": "search",
                "amazon_domain": "amazon.co.uk",
                "search_term": "kettle",
                "max_page": 1
            })
        );
    }
}
