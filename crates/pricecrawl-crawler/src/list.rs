//! Sequential price check of a whole shopping list.

use std::time::Duration;

use pricecrawl_core::{PriceQuote, SourceFailure};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::aggregator::{AggregateReport, Aggregator};
use crate::cache::ResultCache;

/// Prices found for one list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemPrices {
    pub item: String,
    pub best: Option<PriceQuote>,
    pub quotes: Vec<PriceQuote>,
    pub failures: Vec<SourceFailure>,
    /// Set when the query for this item failed as a whole.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cached: bool,
}

impl ItemPrices {
    fn from_report(item: &str, report: AggregateReport, cached: bool) -> Self {
        Self {
            item: item.to_owned(),
            best: report.best().cloned(),
            quotes: report.quotes,
            failures: report.failures,
            error: None,
            cached,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListReport {
    pub items: Vec<ItemPrices>,
}

impl ListReport {
    /// Sum of the cheapest price of every item that has one.
    ///
    /// Saturates at [`Decimal::MAX`] instead of overflowing.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .filter_map(|i| i.best.as_ref())
            .fold(Decimal::ZERO, |sum, q| {
                sum.checked_add(q.price).unwrap_or(Decimal::MAX)
            })
    }

    #[must_use]
    pub fn priced_count(&self) -> usize {
        self.items.iter().filter(|i| i.best.is_some()).count()
    }
}

/// Check every item in order, pausing `inter_query_delay` between network
/// queries.
///
/// Cached items are answered from `cache` without a query or a pause, and
/// fresh successful reports are written back to it. A failed item is
/// recorded with its error and never stops the rest of the list.
pub async fn check_list(
    aggregator: &Aggregator,
    cache: Option<&ResultCache>,
    items: &[String],
    inter_query_delay: Duration,
) -> ListReport {
    let mut report = ListReport::default();
    let mut queried_before = false;

    for item in items {
        if let Some(entry) = cache.and_then(|c| c.get(item)) {
            tracing::debug!(item = %item, "list item served from cache");
            report
                .items
                .push(ItemPrices::from_report(item, entry.report, true));
            continue;
        }

        if queried_before && !inter_query_delay.is_zero() {
            tokio::time::sleep(inter_query_delay).await;
        }
        queried_before = true;

        match aggregator.query(item).await {
            Ok(result) => {
                if let Some(cache) = cache {
                    cache.put(item, result.clone());
                }
                report
                    .items
                    .push(ItemPrices::from_report(item, result, false));
            }
            Err(e) => {
                tracing::warn!(item = %item, error = %e, "list item price check failed");
                let failures = match &e {
                    crate::CrawlerError::AllSourcesFailed { failures } => failures.clone(),
                    _ => Vec::new(),
                };
                report.items.push(ItemPrices {
                    item: item.clone(),
                    best: None,
                    quotes: Vec::new(),
                    failures,
                    error: Some(e.to_string()),
                    cached: false,
                });
            }
        }
    }

    tracing::info!(
        items = report.items.len(),
        priced = report.priced_count(),
        total = %report.total(),
        "shopping list checked"
    );
    report
}
