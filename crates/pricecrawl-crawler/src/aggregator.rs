//! Concurrent fan-out of one product query across every registered source.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use pricecrawl_core::{AppConfig, FailureKind, PriceQuote, RawQuote, SourceFailure};
use serde::Serialize;

use crate::adapter::{SourceAdapter, SourceOutcome};
use crate::error::CrawlerError;
use crate::rank::rank;

/// Time budgets for a query.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    /// Budget for a single adapter call.
    pub adapter_timeout: Duration,
    /// Budget for the whole query, no matter how many adapters hang.
    pub deadline: Duration,
}

impl AggregatorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            adapter_timeout: Duration::from_secs(config.adapter_timeout_secs),
            deadline: Duration::from_secs(config.query_deadline_secs),
        }
    }
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            adapter_timeout: Duration::from_secs(8),
            deadline: Duration::from_secs(15),
        }
    }
}

/// How a successful query should be presented to an end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// Every source answered and at least one price was found.
    Complete,
    /// Prices were found but some sources failed.
    Partial,
    /// No source produced a usable price. Not an error.
    NoPrices,
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryStatus::Complete => write!(f, "complete"),
            QueryStatus::Partial => write!(f, "partial"),
            QueryStatus::NoPrices => write!(f, "no_prices"),
        }
    }
}

/// Ranked quotes plus the sources that failed along the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    /// Ascending by price; ties in source-registration order.
    pub quotes: Vec<PriceQuote>,
    pub failures: Vec<SourceFailure>,
    pub sources_queried: usize,
}

impl AggregateReport {
    #[must_use]
    pub fn status(&self) -> QueryStatus {
        if self.quotes.is_empty() {
            QueryStatus::NoPrices
        } else if self.failures.is_empty() {
            QueryStatus::Complete
        } else {
            QueryStatus::Partial
        }
    }

    /// The cheapest quote, if any.
    #[must_use]
    pub fn best(&self) -> Option<&PriceQuote> {
        self.quotes.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub id: String,
    pub store: String,
}

/// Owns the registered adapters and runs queries against them.
pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    settings: AggregatorSettings,
}

impl Aggregator {
    /// Adapters are queried, and tie-broken, in the order given here.
    #[must_use]
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, settings: AggregatorSettings) -> Self {
        Self { adapters, settings }
    }

    #[must_use]
    pub fn sources(&self) -> Vec<SourceInfo> {
        self.adapters
            .iter()
            .map(|a| SourceInfo {
                id: a.id().to_owned(),
                store: a.store_name().to_owned(),
            })
            .collect()
    }

    #[must_use]
    pub fn settings(&self) -> AggregatorSettings {
        self.settings
    }

    /// Query every registered source for `product_name`.
    ///
    /// Individual source failures are reported in
    /// [`AggregateReport::failures`]; the query only fails when no source
    /// produced an outcome at all.
    ///
    /// # Errors
    ///
    /// - [`CrawlerError::InvalidInput`] for a blank product name (no source is called)
    /// - [`CrawlerError::NoSources`] when no adapters are registered
    /// - [`CrawlerError::AllSourcesFailed`] with one failure per source
    pub async fn query(&self, product_name: &str) -> Result<AggregateReport, CrawlerError> {
        let product = validate_product_name(product_name)?;
        if self.adapters.is_empty() {
            return Err(CrawlerError::NoSources);
        }
        self.run(&self.adapters, product).await
    }

    /// Query a single source by id (case-insensitive).
    ///
    /// # Errors
    ///
    /// As [`Aggregator::query`], plus [`CrawlerError::UnknownSource`] when
    /// `source_id` is not registered.
    pub async fn query_source(
        &self,
        source_id: &str,
        product_name: &str,
    ) -> Result<AggregateReport, CrawlerError> {
        let product = validate_product_name(product_name)?;
        let adapter = self
            .adapters
            .iter()
            .find(|a| a.id().eq_ignore_ascii_case(source_id.trim()))
            .ok_or_else(|| CrawlerError::UnknownSource(source_id.to_owned()))?;
        self.run(std::slice::from_ref(adapter), product).await
    }

    #[tracing::instrument(name = "price_query", skip(self, adapters), fields(sources = adapters.len()))]
    async fn run(
        &self,
        adapters: &[Arc<dyn SourceAdapter>],
        product: &str,
    ) -> Result<AggregateReport, CrawlerError> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.settings.deadline;
        let adapter_timeout = self.settings.adapter_timeout;

        let mut slots: Vec<Option<SourceOutcome>> = adapters.iter().map(|_| None).collect();
        let mut pending: FuturesUnordered<_> = adapters
            .iter()
            .enumerate()
            .map(|(index, adapter)| async move {
                let guarded = AssertUnwindSafe(adapter.fetch(product)).catch_unwind();
                let outcome = match tokio::time::timeout(adapter_timeout, guarded).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(payload)) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!(
                            source = adapter.id(),
                            product,
                            panic = %message,
                            "source adapter panicked"
                        );
                        Err(SourceFailure::new(
                            adapter.id(),
                            FailureKind::ParseError,
                            format!("adapter panicked: {message}"),
                        ))
                    }
                    Err(_) => {
                        tracing::warn!(
                            source = adapter.id(),
                            product,
                            timeout_ms = adapter_timeout.as_millis(),
                            "source timed out"
                        );
                        Err(SourceFailure::new(
                            adapter.id(),
                            FailureKind::Timeout,
                            format!("no response within {} ms", adapter_timeout.as_millis()),
                        ))
                    }
                };
                (index, outcome)
            })
            .collect();

        let joined = tokio::time::timeout_at(deadline, async {
            while let Some((index, outcome)) = pending.next().await {
                slots[index] = Some(outcome);
            }
        })
        .await;
        // Dropping the set cancels any adapter still in flight.
        drop(pending);

        if joined.is_err() {
            tracing::warn!(
                product,
                deadline_ms = self.settings.deadline.as_millis(),
                unresolved = slots.iter().filter(|s| s.is_none()).count(),
                "query deadline elapsed; cancelling outstanding sources"
            );
        }

        let mut merged: Vec<RawQuote> = Vec::new();
        let mut failures: Vec<SourceFailure> = Vec::new();
        for (adapter, slot) in adapters.iter().zip(slots) {
            match slot {
                Some(Ok(quotes)) => merged.extend(quotes),
                Some(Err(failure)) => failures.push(failure),
                None => failures.push(SourceFailure::new(
                    adapter.id(),
                    FailureKind::Timeout,
                    "cancelled at the query deadline",
                )),
            }
        }

        let elapsed_ms = started.elapsed().as_millis();
        if failures.len() == adapters.len() {
            tracing::error!(
                product,
                sources = adapters.len(),
                elapsed_ms,
                "every source failed"
            );
            return Err(CrawlerError::AllSourcesFailed { failures });
        }

        let quotes = rank(merged);
        tracing::info!(
            product,
            sources = adapters.len(),
            failed = failures.len(),
            count = quotes.len(),
            elapsed_ms,
            "price query complete"
        );

        Ok(AggregateReport {
            quotes,
            failures,
            sources_queried: adapters.len(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Trim a product name, rejecting one that is blank.
///
/// # Errors
///
/// Returns [`CrawlerError::InvalidInput`] for empty or whitespace-only input.
pub fn validate_product_name(product_name: &str) -> Result<&str, CrawlerError> {
    let trimmed = product_name.trim();
    if trimmed.is_empty() {
        return Err(CrawlerError::InvalidInput {
            reason: "product name must not be empty".to_owned(),
        });
    }
    Ok(trimmed)
}

#[cfg(test)]
#[path = "aggregator_test.rs"]
mod tests;
