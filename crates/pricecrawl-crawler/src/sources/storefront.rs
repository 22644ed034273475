//! Storefront search pages scraped as HTML.
//!
//! One adapter instance per configured shop. Selectors come from the sources
//! file and are compiled once at construction, so a bad selector fails at
//! startup rather than on every query.

use async_trait::async_trait;
use pricecrawl_core::{RawQuote, SelectorConfig, SourceConfig};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use super::http::{build_error, HttpSource};
use crate::adapter::{AdapterSettings, SourceAdapter};
use crate::error::{CrawlerError, SourceError};
use crate::price::extract_amount;

/// Storefronts serve bot walls to non-browser user agents.
const BROWSER_FALLBACK_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const DEFAULT_TITLE_SELECTOR: &str = r#"h3, .product-name, [data-testid="product-name"]"#;
const FALLBACK_TITLE: &str = "Product";

pub struct StorefrontAdapter {
    http: HttpSource,
    search_param: String,
    container: Selector,
    price: Selector,
    fallback_price: Option<Selector>,
    title: Selector,
    link: Selector,
}

impl StorefrontAdapter {
    /// # Errors
    ///
    /// Returns [`CrawlerError::Build`] if `search_param` or `selectors` is
    /// missing, a selector does not parse, or the URL is invalid.
    pub fn new(config: &SourceConfig, settings: &AdapterSettings) -> Result<Self, CrawlerError> {
        let search_param = config
            .search_param
            .clone()
            .ok_or_else(|| build_error(&config.id, "search_param is required"))?;
        let selectors: &SelectorConfig = config
            .selectors
            .as_ref()
            .ok_or_else(|| build_error(&config.id, "selectors are required"))?;

        let browser = AdapterSettings {
            user_agent: BROWSER_FALLBACK_UA.to_owned(),
            ..settings.clone()
        };

        Ok(Self {
            http: HttpSource::new(config, &browser)?,
            search_param,
            container: compile(&config.id, &selectors.container)?,
            price: compile(&config.id, &selectors.price)?,
            fallback_price: selectors
                .fallback_price
                .as_deref()
                .map(|s| compile(&config.id, s))
                .transpose()?,
            title: compile(
                &config.id,
                selectors.title.as_deref().unwrap_or(DEFAULT_TITLE_SELECTOR),
            )?,
            link: compile(&config.id, "a[href]")?,
        })
    }

    fn search_url(&self, product_name: &str) -> Url {
        let mut url = self.http.base_url.clone();
        url.query_pairs_mut()
            .append_pair(&self.search_param, product_name);
        url
    }

    /// Map the first `max_results` product tiles on `page` to quotes.
    ///
    /// Tiles without any price element are skipped.
    fn extract(&self, page: &str, page_url: &Url) -> Vec<RawQuote> {
        let document = Html::parse_document(page);
        document
            .select(&self.container)
            .take(self.http.settings.max_results)
            .filter_map(|tile| self.map_tile(tile, page_url))
            .collect()
    }

    fn map_tile(&self, tile: ElementRef<'_>, page_url: &Url) -> Option<RawQuote> {
        let price_el = tile.select(&self.price).next().or_else(|| {
            self.fallback_price
                .as_ref()
                .and_then(|s| tile.select(s).next())
        })?;
        let price = extract_amount(&element_text(price_el));

        let title = tile
            .select(&self.title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| FALLBACK_TITLE.to_owned());

        let url = tile
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| page_url.join(href).ok())
            .unwrap_or_else(|| page_url.clone());

        Some(RawQuote {
            store: self.http.store.clone(),
            title,
            price,
            url: Some(url.to_string()),
            image_url: None,
        })
    }
}

#[async_trait]
impl SourceAdapter for StorefrontAdapter {
    fn id(&self) -> &str {
        &self.http.id
    }

    fn store_name(&self) -> &str {
        &self.http.store
    }

    async fn search(&self, product_name: &str) -> Result<Vec<RawQuote>, SourceError> {
        let url = self.search_url(product_name);
        let page = self
            .http
            .send_text(|client| {
                client
                    .get(url.clone())
                    .header(
                        reqwest::header::ACCEPT,
                        "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
                    )
                    .header(reqwest::header::ACCEPT_LANGUAGE, "en-GB,en;q=0.9")
            })
            .await?;

        if looks_like_bot_challenge(&page) {
            return Err(SourceError::Auth {
                source_id: self.http.id.clone(),
                reason: "search page is an anti-bot challenge".to_owned(),
            });
        }

        Ok(self.extract(&page, &url))
    }
}

fn compile(source_id: &str, selector: &str) -> Result<Selector, CrawlerError> {
    Selector::parse(selector)
        .map_err(|e| build_error(source_id, format!("invalid selector \"{selector}\": {e}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_bot_challenge(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    let has_cloudflare_banner = lowered.contains("attention required! | cloudflare");
    let has_challenge_platform = lowered.contains("/cdn-cgi/challenge-platform/");
    let has_just_a_moment = lowered.contains("just a moment...");
    let has_cookie_gate = lowered.contains("please enable cookies");
    let has_cf_chl = lowered.contains("cf-chl-");
    let has_captcha_wall = lowered.contains("captcha-delivery.com");

    has_cloudflare_banner
        || has_challenge_platform
        || has_captcha_wall
        || (has_just_a_moment && has_cookie_gate)
        || (has_just_a_moment && has_cf_chl)
}

#[cfg(test)]
#[path = "storefront_test.rs"]
mod tests;
