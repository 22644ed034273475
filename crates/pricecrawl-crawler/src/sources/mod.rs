//! Concrete retailer adapters and their construction from the sources file.

mod bestbuy;
mod http;
mod kroger;
mod rainforest;
mod storefront;
mod target;
mod walmart;

use std::sync::Arc;

use pricecrawl_core::{SourceConfig, SourceKind, SourcesFile};

use crate::adapter::{AdapterSettings, SourceAdapter};
use crate::error::CrawlerError;

pub use bestbuy::BestBuyAdapter;
pub use kroger::KrogerAdapter;
pub use rainforest::RainforestAdapter;
pub use storefront::StorefrontAdapter;
pub use target::TargetAdapter;
pub use walmart::WalmartAdapter;

use http::build_error;

/// Build adapters for every enabled source, in file order.
///
/// Credentials are resolved through `lookup` by the env var names in the
/// file. A source whose credentials are missing is skipped with a warning;
/// the rest are still built.
///
/// # Errors
///
/// Returns [`CrawlerError::Build`] when an entry is misconfigured (missing
/// `*_env` field, invalid URL or selector).
pub fn build_adapters<F>(
    file: &SourcesFile,
    settings: &AdapterSettings,
    lookup: F,
) -> Result<Vec<Arc<dyn SourceAdapter>>, CrawlerError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut adapters = Vec::new();
    for config in file.enabled() {
        if let Some(adapter) = build_adapter(config, settings, &lookup)? {
            tracing::info!(source = %config.id, kind = %config.kind, "registered price source");
            adapters.push(adapter);
        }
    }
    Ok(adapters)
}

/// [`build_adapters`] reading credentials from the process environment.
///
/// # Errors
///
/// See [`build_adapters`].
pub fn build_adapters_from_env(
    file: &SourcesFile,
    settings: &AdapterSettings,
) -> Result<Vec<Arc<dyn SourceAdapter>>, CrawlerError> {
    build_adapters(file, settings, |name| std::env::var(name).ok())
}

fn build_adapter<F>(
    config: &SourceConfig,
    settings: &AdapterSettings,
    lookup: &F,
) -> Result<Option<Arc<dyn SourceAdapter>>, CrawlerError>
where
    F: Fn(&str) -> Option<String>,
{
    let adapter: Arc<dyn SourceAdapter> = match config.kind {
        SourceKind::Walmart => {
            let Some(key) = credential(config, "api_key_env", config.api_key_env.as_deref(), lookup)?
            else {
                return Ok(None);
            };
            Arc::new(WalmartAdapter::new(config, key, settings)?)
        }
        SourceKind::Target => {
            let Some(key) = credential(config, "api_key_env", config.api_key_env.as_deref(), lookup)?
            else {
                return Ok(None);
            };
            Arc::new(TargetAdapter::new(config, key, settings)?)
        }
        SourceKind::Rainforest => {
            let Some(key) = credential(config, "api_key_env", config.api_key_env.as_deref(), lookup)?
            else {
                return Ok(None);
            };
            Arc::new(RainforestAdapter::new(config, key, settings)?)
        }
        SourceKind::Bestbuy => {
            let Some(key) = credential(config, "api_key_env", config.api_key_env.as_deref(), lookup)?
            else {
                return Ok(None);
            };
            Arc::new(BestBuyAdapter::new(config, key, settings)?)
        }
        SourceKind::Kroger => {
            let client_id =
                credential(config, "client_id_env", config.client_id_env.as_deref(), lookup)?;
            let client_secret = credential(
                config,
                "client_secret_env",
                config.client_secret_env.as_deref(),
                lookup,
            )?;
            let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
                return Ok(None);
            };
            Arc::new(KrogerAdapter::new(config, client_id, client_secret, settings)?)
        }
        SourceKind::Storefront => Arc::new(StorefrontAdapter::new(config, settings)?),
    };
    Ok(Some(adapter))
}

/// Resolve one credential. `Ok(None)` means the variable is unset or blank
/// and the source should be skipped.
fn credential<F>(
    config: &SourceConfig,
    field: &str,
    env_name: Option<&str>,
    lookup: &F,
) -> Result<Option<String>, CrawlerError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(var) = env_name else {
        return Err(build_error(
            &config.id,
            format!("{field} is required for {} sources", config.kind),
        ));
    };

    match lookup(var).filter(|value| !value.trim().is_empty()) {
        Some(value) => Ok(Some(value)),
        None => {
            tracing::warn!(
                source = %config.id,
                env_var = var,
                "credential is not set; skipping source"
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
pub(crate) fn test_source(id: &str, kind: SourceKind, base_url: &str) -> SourceConfig {
    SourceConfig {
        id: id.to_owned(),
        name: id.to_owned(),
        kind,
        enabled: true,
        base_url: base_url.to_owned(),
        token_url: None,
        amazon_domain: None,
        search_param: None,
        api_key_env: None,
        client_id_env: None,
        client_secret_env: None,
        selectors: None,
    }
}
