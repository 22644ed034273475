//! Command handlers for `check`, `list`, and `sources`.
//!
//! Results go to stdout; per-source failures go to stderr so a partial
//! answer is still printed in full.

use std::path::Path;
use std::time::Duration;

use pricecrawl_core::{AppConfig, PriceQuote, SourceFailure};
use pricecrawl_crawler::{
    build_adapters_from_env, check_list, AdapterSettings, AggregateReport, Aggregator,
    AggregatorSettings, ListReport, QueryStatus,
};

pub(crate) fn build_aggregator(config: &AppConfig) -> anyhow::Result<Aggregator> {
    let sources = pricecrawl_core::load_sources(&config.sources_path)?;
    let adapters = build_adapters_from_env(&sources, &AdapterSettings::from_app_config(config))?;
    if adapters.is_empty() {
        tracing::warn!(
            path = %config.sources_path.display(),
            "no price sources registered; check enabled flags and credential env vars"
        );
    }
    Ok(Aggregator::new(
        adapters,
        AggregatorSettings::from_app_config(config),
    ))
}

/// Query one product and print its quotes cheapest first.
///
/// # Errors
///
/// Returns an error (non-zero exit) for a blank product name, an unknown
/// source, or when every source failed.
pub(crate) async fn run_check(
    aggregator: &Aggregator,
    product: &str,
    source: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let report = match source {
        Some(id) => aggregator.query_source(id, product).await?,
        None => aggregator.query(product).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in report_lines(&report) {
        println!("{line}");
    }
    print_failures(&report.failures);
    Ok(())
}

/// Check every item in a list file and print the best price per item plus
/// the list total.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains no items.
pub(crate) async fn run_list(
    aggregator: &Aggregator,
    file: &Path,
    delay_ms: u64,
    json: bool,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
    let items = parse_list_items(&content);
    if items.is_empty() {
        anyhow::bail!("{} contains no items", file.display());
    }

    if !json {
        println!("Checking prices for {} items...", items.len());
    }
    let report = check_list(aggregator, None, &items, Duration::from_millis(delay_ms)).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in list_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn print_sources(aggregator: &Aggregator) {
    let sources = aggregator.sources();
    if sources.is_empty() {
        println!("No sources registered. Check the sources file and credential env vars.");
        return;
    }
    for source in sources {
        println!("  {:<12} {}", source.id, source.store);
    }
}

/// One item per non-blank line; `#` starts a comment line.
pub(crate) fn parse_list_items(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect()
}

pub(crate) fn quote_line(quote: &PriceQuote) -> String {
    if quote.title.is_empty() {
        format!("{}: {}", quote.store, quote.price)
    } else {
        format!("{}: {} - {}", quote.store, quote.price, quote.title)
    }
}

pub(crate) fn report_lines(report: &AggregateReport) -> Vec<String> {
    if report.status() == QueryStatus::NoPrices {
        return vec!["No prices found".to_owned()];
    }
    report.quotes.iter().map(quote_line).collect()
}

pub(crate) fn list_lines(report: &ListReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .items
        .iter()
        .map(|item| match (&item.best, &item.error) {
            (Some(best), _) => format!("  \u{2713} {:<24} {}", item.item, quote_line(best)),
            (None, Some(error)) => format!("  \u{2717} {:<24} {error}", item.item),
            (None, None) => format!("  - {:<24} no prices found", item.item),
        })
        .collect();
    lines.push(format!(
        "Total: {} ({} of {} items priced)",
        report.total().round_dp(2),
        report.priced_count(),
        report.items.len()
    ));
    lines
}

fn print_failures(failures: &[SourceFailure]) {
    for failure in failures {
        eprintln!("warning: {failure}");
    }
}
