//! Multi-source price aggregation.
//!
//! A product name is fanned out to every configured [`SourceAdapter`], each
//! outcome is collected without letting one failure abort the others, and the
//! surviving quotes are validated and ranked by price into an
//! [`AggregateReport`].

pub mod adapter;
pub mod aggregator;
pub mod cache;
pub mod error;
pub mod list;
pub mod price;
pub mod rank;
pub mod sources;

mod retry;

pub use adapter::{AdapterSettings, SourceAdapter, SourceOutcome};
pub use aggregator::{
    validate_product_name, AggregateReport, Aggregator, AggregatorSettings, QueryStatus, SourceInfo,
};
pub use cache::{CacheEntry, ResultCache};
pub use error::{CrawlerError, SourceError};
pub use list::{check_list, ItemPrices, ListReport};
pub use price::parse_price;
pub use rank::rank;
pub use sources::{build_adapters, build_adapters_from_env};
