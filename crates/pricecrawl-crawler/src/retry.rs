//! Retry with exponential back-off and jitter for adapter requests.
//!
//! Transient errors (429, connect failures, timeouts, 5xx) are retried.
//! Auth, parse, and other client errors are returned immediately because
//! repeating the request would not change the answer.

use std::future::Future;
use std::time::Duration;

use crate::error::SourceError;

const MAX_DELAY_MS: u64 = 5_000;

/// Returns `true` for errors worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &SourceError) -> bool {
    match err {
        SourceError::Http(e) => e.is_timeout() || e.is_connect(),
        SourceError::RateLimited { .. } => true,
        SourceError::UnexpectedStatus { status, .. } => *status >= 500,
        SourceError::Auth { .. }
        | SourceError::Deserialize { .. }
        | SourceError::InvalidUrl { .. } => false,
    }
}

/// Minimum wait requested by the source itself, capped like the back-off.
fn retry_after_floor_ms(err: &SourceError) -> u64 {
    match err {
        SourceError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } => secs.saturating_mul(1_000).min(MAX_DELAY_MS),
        _ => 0,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Back-off schedule with `backoff_base_ms = 250`:
///
/// | Attempt | Sleep before next attempt |
/// |---------|---------------------------|
/// | 1       | 250 ms × 2⁰ ± 25 % jitter |
/// | 2       | 250 ms × 2¹ ± 25 % jitter |
/// | 3       | 250 ms × 2² ± 25 % jitter |
///
/// A 429 carrying `Retry-After` raises the delay to that many seconds.
/// Delay is capped at 5 s; the adapter's timeout still bounds the whole call.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                let delay_ms = jittered.max(retry_after_floor_ms(&err));
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient source error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limited() -> SourceError {
        SourceError::RateLimited {
            source_id: "walmart".to_owned(),
            retry_after_secs: None,
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, SourceError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_on_rate_limited_then_succeeds() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                let n = cc.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(rate_limited())
                } else {
                    Ok::<u32, SourceError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_server_errors_until_exhausted() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(2, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, SourceError>(SourceError::UnexpectedStatus {
                    status: 502,
                    url: "https://api.example.com".to_owned(),
                })
            }
        })
        .await;
        // max_retries=2 → 3 total attempts
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(SourceError::UnexpectedStatus { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_auth_error() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let result = retry_with_backoff(3, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<u32, SourceError>(SourceError::Auth {
                    source_id: "kroger".to_owned(),
                    reason: "HTTP 401".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(SourceError::Auth { .. })));
    }

    #[test]
    fn retry_after_sets_a_capped_floor() {
        let limited = |secs| SourceError::RateLimited {
            source_id: "walmart".to_owned(),
            retry_after_secs: secs,
        };
        assert_eq!(retry_after_floor_ms(&limited(None)), 0);
        assert_eq!(retry_after_floor_ms(&limited(Some(2))), 2_000);
        assert_eq!(retry_after_floor_ms(&limited(Some(120))), MAX_DELAY_MS);
        assert_eq!(
            retry_after_floor_ms(&SourceError::UnexpectedStatus {
                status: 503,
                url: "https://api.example.com".to_owned(),
            }),
            0
        );
    }

    #[tokio::test]
    async fn waits_at_least_retry_after_before_retrying() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let started = std::time::Instant::now();
        let result = retry_with_backoff(1, 0, || {
            let cc = Arc::clone(&cc);
            async move {
                if cc.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SourceError::RateLimited {
                        source_id: "walmart".to_owned(),
                        retry_after_secs: Some(1),
                    })
                } else {
                    Ok::<u32, SourceError>(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!is_retriable(&SourceError::UnexpectedStatus {
            status: 404,
            url: "https://api.example.com".to_owned(),
        }));
    }
}
