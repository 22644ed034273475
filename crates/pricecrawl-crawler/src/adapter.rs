//! The uniform per-retailer adapter contract.

use std::time::Duration;

use async_trait::async_trait;
use pricecrawl_core::{AppConfig, RawQuote, SourceFailure};

use crate::error::SourceError;

/// Result of one adapter call: quotes (possibly none) or a classified failure.
pub type SourceOutcome = Result<Vec<RawQuote>, SourceFailure>;

/// A retailer integration.
///
/// Implementations own their wire format, auth scheme, and response mapping.
/// The aggregator only ever calls [`SourceAdapter::fetch`], which cannot fail:
/// every fault comes back as the `Err` arm of a [`SourceOutcome`].
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registration id, e.g. `"bestbuy"`.
    fn id(&self) -> &str;

    /// Display name stamped on quotes, e.g. `"Best Buy"`.
    fn store_name(&self) -> &str;

    /// Query the retailer and map at most `max_results` matches.
    ///
    /// `product_name` is already trimmed and non-empty. An empty `Vec` means
    /// the retailer legitimately had no matches.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on network, auth, or parse faults.
    async fn search(&self, product_name: &str) -> Result<Vec<RawQuote>, SourceError>;

    /// Run [`SourceAdapter::search`] and classify any fault.
    async fn fetch(&self, product_name: &str) -> SourceOutcome {
        match self.search(product_name).await {
            Ok(quotes) => {
                tracing::debug!(
                    source = self.id(),
                    product = product_name,
                    count = quotes.len(),
                    "source returned quotes"
                );
                Ok(quotes)
            }
            Err(e) => {
                let kind = e.kind();
                tracing::warn!(
                    source = self.id(),
                    product = product_name,
                    kind = %kind,
                    error = %e,
                    "source fetch failed"
                );
                Err(SourceFailure::new(self.id(), kind, e.to_string()))
            }
        }
    }
}

/// Settings shared by every HTTP-backed adapter.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    /// Per-request timeout enforced by the adapter's own HTTP client.
    pub timeout: Duration,
    pub user_agent: String,
    /// Cap on quotes mapped from one response.
    pub max_results: usize,
    /// Additional attempts after the first on transient errors.
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
}

impl AdapterSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.adapter_timeout_secs),
            user_agent: config.user_agent.clone(),
            max_results: config.max_results_per_source,
            max_retries: config.max_retries,
            retry_backoff_base_ms: config.retry_backoff_base_ms,
        }
    }

    /// Builds a `reqwest::Client` with this adapter's timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the client cannot be constructed (e.g.
    /// invalid TLS config).
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout.min(Duration::from_secs(10)))
            .user_agent(&self.user_agent)
            .build()
    }
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            user_agent: "pricecrawl/0.1 (price-comparison)".to_owned(),
            max_results: 3,
            max_retries: 1,
            retry_backoff_base_ms: 250,
        }
    }
}
