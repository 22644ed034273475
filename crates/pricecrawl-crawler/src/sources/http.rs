//! HTTP plumbing shared by the JSON adapters: status classification, body
//! decoding, and retried sends.

use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use pricecrawl_core::SourceConfig;

use crate::adapter::AdapterSettings;
use crate::error::{CrawlerError, SourceError};
use crate::retry::retry_with_backoff;

/// Identity and transport shared by every HTTP-backed adapter.
pub(crate) struct HttpSource {
    pub(crate) id: String,
    pub(crate) store: String,
    pub(crate) base_url: Url,
    pub(crate) client: Client,
    pub(crate) settings: AdapterSettings,
}

impl HttpSource {
    pub(crate) fn new(config: &SourceConfig, settings: &AdapterSettings) -> Result<Self, CrawlerError> {
        let client = settings
            .build_client()
            .map_err(|e| build_error(&config.id, format!("HTTP client: {e}")))?;
        Self::with_client(config, settings, client)
    }

    pub(crate) fn with_client(
        config: &SourceConfig,
        settings: &AdapterSettings,
        client: Client,
    ) -> Result<Self, CrawlerError> {
        Ok(Self {
            id: config.id.clone(),
            store: config.name.clone(),
            base_url: parse_url(&config.id, &config.base_url)?,
            client,
            settings: settings.clone(),
        })
    }

    /// Send the request produced by `build`, retrying transient failures,
    /// and decode a JSON body.
    ///
    /// `build` runs once per attempt because a `RequestBuilder` is consumed
    /// by `send`.
    pub(crate) async fn send_json<T, F>(&self, context: &str, build: F) -> Result<T, SourceError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        retry_with_backoff(
            self.settings.max_retries,
            self.settings.retry_backoff_base_ms,
            || {
                let request = build(&self.client);
                async move {
                    let response = request.send().await?;
                    let response = check_status(&self.id, response)?;
                    read_json(response, context).await
                }
            },
        )
        .await
    }

    /// As [`HttpSource::send_json`], returning the body as text.
    pub(crate) async fn send_text<F>(&self, build: F) -> Result<String, SourceError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        retry_with_backoff(
            self.settings.max_retries,
            self.settings.retry_backoff_base_ms,
            || {
                let request = build(&self.client);
                async move {
                    let response = request.send().await?;
                    let response = check_status(&self.id, response)?;
                    Ok(response.text().await?)
                }
            },
        )
        .await
    }
}

/// Map a non-2xx response to a typed error.
///
/// 429 → [`SourceError::RateLimited`] carrying any numeric `Retry-After`,
/// 401/403 → [`SourceError::Auth`], anything else non-2xx →
/// [`SourceError::UnexpectedStatus`].
pub(crate) fn check_status(source_id: &str, response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        return Err(SourceError::RateLimited {
            source_id: source_id.to_owned(),
            retry_after_secs,
        });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SourceError::Auth {
            source_id: source_id.to_owned(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    Err(SourceError::UnexpectedStatus {
        status: status.as_u16(),
        url: redact_url(response.url()),
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    context: &str,
) -> Result<T, SourceError> {
    let body = response.text().await?;
    serde_json::from_str::<T>(&body).map_err(|e| SourceError::Deserialize {
        context: context.to_owned(),
        source: e,
    })
}

/// The URL without its query string, which may carry credentials.
pub(crate) fn redact_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

pub(crate) fn parse_url(source_id: &str, raw: &str) -> Result<Url, CrawlerError> {
    Url::parse(raw).map_err(|e| build_error(source_id, format!("invalid URL \"{raw}\": {e}")))
}

pub(crate) fn build_error(source_id: &str, reason: impl Into<String>) -> CrawlerError {
    CrawlerError::Build {
        source_id: source_id.to_owned(),
        reason: reason.into(),
    }
}
