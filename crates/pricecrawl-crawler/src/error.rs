use pricecrawl_core::{FailureKind, SourceFailure};
use thiserror::Error;

/// A fault inside one adapter call.
///
/// Never escapes the adapter boundary as an error: [`crate::SourceAdapter::fetch`]
/// converts it to a classified [`SourceFailure`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {source_id}")]
    RateLimited {
        source_id: String,
        /// Numeric `Retry-After` from the response, when present.
        retry_after_secs: Option<u64>,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("authentication rejected by {source_id}: {reason}")]
    Auth { source_id: String, reason: String },

    #[error("invalid request URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

// Request URLs carry API keys in their query strings, so the URL is stripped
// before the error can be logged or returned to a caller.
impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Http(err.without_url())
    }
}

impl SourceError {
    /// Classify this fault into the failure taxonomy reported to callers.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceError::Http(e) if e.is_timeout() => FailureKind::Timeout,
            SourceError::Http(e) if e.is_decode() => FailureKind::ParseError,
            SourceError::Http(_)
            | SourceError::RateLimited { .. }
            | SourceError::UnexpectedStatus { .. } => FailureKind::NetworkError,
            SourceError::Auth { .. } => FailureKind::AuthError,
            SourceError::Deserialize { .. } | SourceError::InvalidUrl { .. } => {
                FailureKind::ParseError
            }
        }
    }
}

/// Failures of an aggregate query as a whole, or of adapter construction.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("all {} sources failed: {}", .failures.len(), summarize(.failures))]
    AllSourcesFailed { failures: Vec<SourceFailure> },

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("no price sources are configured")]
    NoSources,

    #[error("failed to build adapter for {source_id}: {reason}")]
    Build { source_id: String, reason: String },
}

fn summarize(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.source, f.kind))
        .collect::<Vec<_>>()
        .join(", ")
}
