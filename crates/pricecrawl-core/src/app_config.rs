use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide settings, read once at startup and never mutated.
///
/// Retailer credentials are deliberately absent: the sources file names the
/// environment variables that hold them, and they are resolved only when
/// adapters are built.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub sources_path: PathBuf,
    /// Budget for a single adapter call, in seconds.
    pub adapter_timeout_secs: u64,
    /// Wall-clock bound for a whole aggregate query, in seconds.
    pub query_deadline_secs: u64,
    pub max_results_per_source: usize,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    /// Courtesy pause between consecutive queries of a shopping list.
    pub inter_query_delay_ms: u64,
}
