//! Price text handling.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static GROUPED_THOUSANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid regex"));

static FIRST_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:,\d{3})*(?:\.\d+)?").expect("valid regex"));

/// Parse a source price string into a strictly positive decimal.
///
/// Accepts an optional leading `$`, `£`, or `€` and `,` thousands grouping
/// (`"$1,299.00"`). Anything else that is not a plain decimal, and any
/// amount that is zero or negative, yields `None`.
#[must_use]
pub fn parse_price(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    let unsigned = trimmed
        .strip_prefix(['$', '£', '€'])
        .unwrap_or(trimmed)
        .trim_start();

    let plain = if unsigned.contains(',') {
        if !GROUPED_THOUSANDS.is_match(unsigned) {
            return None;
        }
        unsigned.replace(',', "")
    } else {
        unsigned.to_owned()
    };

    let value = Decimal::from_str(&plain).ok()?;
    (value > Decimal::ZERO).then_some(value)
}

/// Render a JSON price field as text. Numbers and non-empty strings are
/// accepted; `null`, objects, and blanks are treated as missing.
pub(crate) fn json_price_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        _ => None,
    }
}

/// Prefer `primary` (a sale price) when it is usable, else `fallback` (list price).
pub(crate) fn prefer_price(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    match primary {
        Some(p) if parse_price(&p).is_some() => Some(p),
        other => fallback.or(other),
    }
}

/// Pull the first amount out of free text such as `"£1.50 (75p/100g)"`.
pub(crate) fn extract_amount(text: &str) -> Option<String> {
    FIRST_AMOUNT
        .find(text)
        .map(|m| m.as_str().to_owned())
}
