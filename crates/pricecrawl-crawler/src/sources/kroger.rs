//! Kroger product API behind an OAuth2 client-credentials exchange.
//!
//! A token is requested on every search. Tokens are short-lived and the
//! adapter keeps no state between calls.

use async_trait::async_trait;
use pricecrawl_core::{RawQuote, SourceConfig};
use reqwest::Url;
use serde::Deserialize;

use super::http::{build_error, parse_url, HttpSource};
use crate::adapter::{AdapterSettings, SourceAdapter};
use crate::error::{CrawlerError, SourceError};
use crate::price::{json_price_text, prefer_price};

const KROGER_PRODUCT_ORIGIN: &str = "https://www.kroger.com/p";
const TOKEN_SCOPE: &str = "product.compact";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct KrogerSearchResponse {
    #[serde(default)]
    data: Vec<KrogerProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KrogerProduct {
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    items: Vec<KrogerItem>,
    #[serde(default)]
    images: Vec<KrogerImage>,
}

#[derive(Debug, Deserialize)]
struct KrogerItem {
    #[serde(default)]
    price: Option<KrogerPrice>,
}

#[derive(Debug, Deserialize)]
struct KrogerPrice {
    #[serde(default)]
    regular: Option<serde_json::Value>,
    #[serde(default)]
    promo: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct KrogerImage {
    #[serde(default)]
    sizes: Vec<KrogerImageSize>,
}

#[derive(Debug, Deserialize)]
struct KrogerImageSize {
    #[serde(default)]
    url: Option<String>,
}

pub struct KrogerAdapter {
    http: HttpSource,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl KrogerAdapter {
    /// # Errors
    ///
    /// Returns [`CrawlerError::Build`] if `token_url` is missing, either URL
    /// is invalid, or the HTTP client cannot be built.
    pub fn new(
        config: &SourceConfig,
        client_id: String,
        client_secret: String,
        settings: &AdapterSettings,
    ) -> Result<Self, CrawlerError> {
        let token_url = config
            .token_url
            .as_deref()
            .ok_or_else(|| build_error(&config.id, "token_url is required"))?;
        Ok(Self {
            http: HttpSource::new(config, settings)?,
            token_url: parse_url(&config.id, token_url)?,
            client_id,
            client_secret,
        })
    }

    async fn access_token(&self) -> Result<String, SourceError> {
        let token: TokenResponse = self
            .http
            .send_json("kroger token", |client| {
                client
                    .post(self.token_url.clone())
                    .basic_auth(&self.client_id, Some(&self.client_secret))
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("scope", TOKEN_SCOPE),
                    ])
            })
            .await
            .map_err(|e| match e {
                SourceError::UnexpectedStatus { status, .. } if status < 500 => SourceError::Auth {
                    source_id: self.http.id.clone(),
                    reason: format!("token exchange failed with HTTP {status}"),
                },
                other => other,
            })?;

        if token.access_token.trim().is_empty() {
            return Err(SourceError::Auth {
                source_id: self.http.id.clone(),
                reason: "token exchange returned an empty access token".to_owned(),
            });
        }
        Ok(token.access_token)
    }

    fn search_url(&self, product_name: &str) -> Url {
        let mut url = self.http.base_url.clone();
        url.query_pairs_mut()
            .append_pair("filter.term", product_name)
            .append_pair("filter.limit", &self.http.settings.max_results.to_string());
        url
    }

    fn map_product(&self, product: KrogerProduct) -> RawQuote {
        let price = product.items.into_iter().next().and_then(|i| i.price);
        let (promo, regular) = match price {
            Some(p) => (json_price_text(p.promo.as_ref()), json_price_text(p.regular.as_ref())),
            None => (None, None),
        };

        RawQuote {
            store: self.http.store.clone(),
            title: product.description.unwrap_or_default(),
            price: prefer_price(promo, regular),
            url: product
                .product_id
                .map(|id| format!("{KROGER_PRODUCT_ORIGIN}/{id}")),
            image_url: product
                .images
                .into_iter()
                .next()
                .and_then(|img| img.sizes.into_iter().next())
                .and_then(|size| size.url),
        }
    }
}

#[async_trait]
impl SourceAdapter for KrogerAdapter {
    fn id(&self) -> &str {
        &self.http.id
    }

    fn store_name(&self) -> &str {
        &self.http.store
    }

    async fn search(&self, product_name: &str) -> Result<Vec<RawQuote>, SourceError> {
        let token = self.access_token().await?;
        let url = self.search_url(product_name);
        let body: KrogerSearchResponse = self
            .http
            .send_json("kroger product search", |client| {
                client.get(url.clone()).bearer_auth(&token)
            })
            .await?;

        Ok(body
            .data
            .into_iter()
            .take(self.http.settings.max_results)
            .map(|p| self.map_product(p))
            .collect())
    }
}
