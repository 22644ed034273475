//! Quote records shared by adapters, the aggregator, and the outer surfaces.
//!
//! Adapters emit [`RawQuote`] values whose price is still source text. Only
//! the ranker turns them into [`PriceQuote`], so a quote with an unusable
//! price can never reach a caller.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One retailer's offer as mapped from its wire response, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuote {
    /// Display name of the source, e.g. `"Walmart"`.
    pub store: String,
    /// Matched product title. Empty when the source omitted it.
    pub title: String,
    /// Price exactly as the source reported it (`"19.99"`, `"£1.50"`).
    pub price: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

/// A validated quote with a strictly positive decimal price.
///
/// Currency is whatever the source quoted in; no conversion is applied, so
/// results mixing sources in different currencies are not comparable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub store: String,
    pub title: String,
    pub price: Decimal,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

/// Why a single source failed to produce an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NetworkError,
    AuthError,
    ParseError,
    Timeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::NetworkError => write!(f, "network_error"),
            FailureKind::AuthError => write!(f, "auth_error"),
            FailureKind::ParseError => write!(f, "parse_error"),
            FailureKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// A classified failure scoped to one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// Source id as registered, e.g. `"kroger"`.
    pub source: String,
    pub kind: FailureKind,
    /// Human-readable detail for diagnostics.
    pub message: String,
}

impl SourceFailure {
    pub fn new(source: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.source, self.kind, self.message)
    }
}

/// Normalize a product name into a cache key.
///
/// Lowercases and collapses every run of whitespace to a single space, so
/// `"  Whole  MILK "` and `"whole milk"` share one key.
#[must_use]
pub fn normalize_query_key(product_name: &str) -> String {
    product_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
