//! Validation and price ordering of merged quotes.

use pricecrawl_core::{PriceQuote, RawQuote};

use crate::price::parse_price;

/// Drop quotes without a usable price and order the rest cheapest first.
///
/// The sort is stable: quotes with equal prices keep their input order, which
/// the aggregator arranges to be adapter-registration order. No
/// de-duplication happens across stores.
#[must_use]
pub fn rank(quotes: Vec<RawQuote>) -> Vec<PriceQuote> {
    let mut ranked: Vec<PriceQuote> = quotes
        .into_iter()
        .filter_map(|raw| {
            let Some(price) = raw.price.as_deref().and_then(parse_price) else {
                tracing::debug!(
                    store = %raw.store,
                    title = %raw.title,
                    price = ?raw.price,
                    "dropping quote without a usable price"
                );
                return None;
            };
            Some(PriceQuote {
                store: raw.store,
                title: raw.title,
                price,
                url: raw.url,
                image_url: raw.image_url,
            })
        })
        .collect();
    ranked.sort_by(|a, b| a.price.cmp(&b.price));
    ranked
}
