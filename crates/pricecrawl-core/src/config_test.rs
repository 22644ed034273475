use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_development() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
}

#[test]
fn parse_environment_production() {
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "PRICECRAWL_ENV"));
}

#[test]
fn build_app_config_uses_defaults_when_env_is_empty() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_app_config(lookup_from_map(&map)).expect("defaults are valid");
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:3001");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.sources_path.to_str(), Some("./config/sources.yaml"));
    assert_eq!(cfg.adapter_timeout_secs, 8);
    assert_eq!(cfg.query_deadline_secs, 15);
    assert_eq!(cfg.max_results_per_source, 3);
    assert_eq!(cfg.user_agent, "pricecrawl/0.1 (price-comparison)");
    assert_eq!(cfg.max_retries, 1);
    assert_eq!(cfg.retry_backoff_base_ms, 250);
    assert_eq!(cfg.inter_query_delay_ms, 1000);
}

#[test]
fn build_app_config_fails_with_invalid_bind_addr() {
    let mut map = HashMap::new();
    map.insert("PRICECRAWL_BIND_ADDR", "not-a-socket-addr");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICECRAWL_BIND_ADDR"),
        "expected InvalidEnvVar(PRICECRAWL_BIND_ADDR), got: {result:?}"
    );
}

#[test]
fn inter_query_delay_override() {
    let mut map = HashMap::new();
    map.insert("PRICECRAWL_INTER_QUERY_DELAY_MS", "0");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.inter_query_delay_ms, 0);
}

#[test]
fn inter_query_delay_invalid() {
    let mut map = HashMap::new();
    map.insert("PRICECRAWL_INTER_QUERY_DELAY_MS", "soon");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICECRAWL_INTER_QUERY_DELAY_MS"),
        "expected InvalidEnvVar(PRICECRAWL_INTER_QUERY_DELAY_MS), got: {result:?}"
    );
}

#[test]
fn max_results_override() {
    let mut map = HashMap::new();
    map.insert("PRICECRAWL_MAX_RESULTS_PER_SOURCE", "5");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.max_results_per_source, 5);
}

#[test]
fn max_results_zero_is_rejected() {
    let mut map = HashMap::new();
    map.insert("PRICECRAWL_MAX_RESULTS_PER_SOURCE", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICECRAWL_MAX_RESULTS_PER_SOURCE"),
        "expected InvalidEnvVar(PRICECRAWL_MAX_RESULTS_PER_SOURCE), got: {result:?}"
    );
}

#[test]
fn adapter_timeout_longer_than_deadline_is_rejected() {
    let mut map = HashMap::new();
    map.insert("PRICECRAWL_ADAPTER_TIMEOUT_SECS", "20");
    map.insert("PRICECRAWL_QUERY_DEADLINE_SECS", "15");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICECRAWL_ADAPTER_TIMEOUT_SECS"),
        "expected InvalidEnvVar(PRICECRAWL_ADAPTER_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn zero_deadline_is_rejected() {
    let mut map = HashMap::new();
    map.insert("PRICECRAWL_ADAPTER_TIMEOUT_SECS", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(result.is_err());

    let mut map = HashMap::new();
    map.insert("PRICECRAWL_QUERY_DEADLINE_SECS", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICECRAWL_QUERY_DEADLINE_SECS"),
        "expected InvalidEnvVar(PRICECRAWL_QUERY_DEADLINE_SECS), got: {result:?}"
    );
}

#[test]
fn max_retries_invalid() {
    let mut map = HashMap::new();
    map.insert("PRICECRAWL_MAX_RETRIES", "-1");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICECRAWL_MAX_RETRIES"),
        "expected InvalidEnvVar(PRICECRAWL_MAX_RETRIES), got: {result:?}"
    );
}
