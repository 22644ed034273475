use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so only malformed values can fail.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("PRICECRAWL_ENV", "development"))?;

    let bind_addr = or_default("PRICECRAWL_BIND_ADDR", "0.0.0.0:3001")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("PRICECRAWL_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("PRICECRAWL_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default(
        "PRICECRAWL_SOURCES_PATH",
        "./config/sources.yaml",
    ));

    let adapter_timeout_secs = parse_u64("PRICECRAWL_ADAPTER_TIMEOUT_SECS", "8")?;
    let query_deadline_secs = parse_u64("PRICECRAWL_QUERY_DEADLINE_SECS", "15")?;
    let max_results_per_source = parse_usize("PRICECRAWL_MAX_RESULTS_PER_SOURCE", "3")?;
    let user_agent = or_default("PRICECRAWL_USER_AGENT", "pricecrawl/0.1 (price-comparison)");
    let max_retries = parse_u32("PRICECRAWL_MAX_RETRIES", "1")?;
    let retry_backoff_base_ms = parse_u64("PRICECRAWL_RETRY_BACKOFF_BASE_MS", "250")?;
    let inter_query_delay_ms = parse_u64("PRICECRAWL_INTER_QUERY_DELAY_MS", "1000")?;

    if adapter_timeout_secs == 0 {
        return Err(invalid(
            "PRICECRAWL_ADAPTER_TIMEOUT_SECS",
            "must be greater than 0".to_string(),
        ));
    }
    if query_deadline_secs == 0 {
        return Err(invalid(
            "PRICECRAWL_QUERY_DEADLINE_SECS",
            "must be greater than 0".to_string(),
        ));
    }
    if adapter_timeout_secs > query_deadline_secs {
        return Err(invalid(
            "PRICECRAWL_ADAPTER_TIMEOUT_SECS",
            format!(
                "adapter timeout ({adapter_timeout_secs}s) must not exceed the query deadline ({query_deadline_secs}s)"
            ),
        ));
    }
    if max_results_per_source == 0 {
        return Err(invalid(
            "PRICECRAWL_MAX_RESULTS_PER_SOURCE",
            "must be at least 1".to_string(),
        ));
    }

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        sources_path,
        adapter_timeout_secs,
        query_deadline_secs,
        max_results_per_source,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        inter_query_delay_ms,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PRICECRAWL_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
