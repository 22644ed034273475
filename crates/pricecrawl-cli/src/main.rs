mod check;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricecrawl-cli")]
#[command(about = "Compare a product's price across retailers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Look up one product across every configured source
    Check {
        /// Product name to search for
        product: String,
        /// Query a single source by id (e.g. walmart)
        #[arg(long)]
        source: Option<String>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check every item of a shopping list file, one item per line
    List {
        /// List file; blank lines and `#` comments are skipped
        file: PathBuf,
        /// Pause between items in milliseconds (defaults to PRICECRAWL_INTER_QUERY_DELAY_MS)
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the sources that would be queried
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = pricecrawl_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    // stdout is reserved for results so `--json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let aggregator = check::build_aggregator(&config)?;

    match cli.command {
        Commands::Check {
            product,
            source,
            json,
        } => check::run_check(&aggregator, &product, source.as_deref(), json).await,
        Commands::List {
            file,
            delay_ms,
            json,
        } => {
            let delay_ms = delay_ms.unwrap_or(config.inter_query_delay_ms);
            check::run_list(&aggregator, &file, delay_ms, json).await
        }
        Commands::Sources => {
            check::print_sources(&aggregator);
            Ok(())
        }
    }
}
