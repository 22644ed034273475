pub mod app_config;
pub mod config;
pub mod quote;
pub mod sources;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use quote::{
    normalize_query_key, FailureKind, PriceQuote, RawQuote, SourceFailure,
};
pub use sources::{
    load_sources, SelectorConfig, SourceConfig, SourceKind, SourcesFile,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[source] serde_yaml::Error),

    #[error("sources validation failed: {0}")]
    Validation(String),
}
