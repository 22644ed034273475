use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use pricecrawl_core::RawQuote;
use pricecrawl_crawler::{AggregatorSettings, SourceAdapter, SourceError};
use tower::ServiceExt;

use super::*;

/// Quotes a fixed price, or fails with a 503 when `price` is `None`.
struct FixedSource {
    id: &'static str,
    price: Option<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl SourceAdapter for FixedSource {
    fn id(&self) -> &str {
        self.id
    }

    fn store_name(&self) -> &str {
        self.id
    }

    async fn search(&self, product_name: &str) -> Result<Vec<RawQuote>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.price {
            Some(price) => Ok(vec![RawQuote {
                store: self.id.to_owned(),
                title: product_name.to_owned(),
                price: Some(price.to_owned()),
                url: None,
                image_url: None,
            }]),
            None => Err(SourceError::UnexpectedStatus {
                status: 503,
                url: "https://down.example.com".to_owned(),
            }),
        }
    }
}

fn source(id: &'static str, price: Option<&'static str>) -> Arc<FixedSource> {
    Arc::new(FixedSource {
        id,
        price,
        calls: AtomicUsize::new(0),
    })
}

fn state(sources: &[Arc<FixedSource>]) -> AppState {
    let adapters: Vec<Arc<dyn SourceAdapter>> = sources
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn SourceAdapter>)
        .collect();
    AppState {
        aggregator: Arc::new(Aggregator::new(adapters, AggregatorSettings::default())),
        cache: Arc::new(ResultCache::new()),
    }
}

fn app(state: AppState) -> Router {
    build_app(state, AuthState::disabled(), default_rate_limit_state())
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).expect("json parse");
    (status, json)
}

#[tokio::test]
async fn health_is_public_and_carries_request_id() {
    let app = build_app(
        state(&[]),
        AuthState::from_keys("secret", false).expect("auth"),
        default_rate_limit_state(),
    );
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-42")
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["meta"]["request_id"], "req-42");
}

#[tokio::test]
async fn prices_are_sorted_and_partial_failures_reported() {
    let sources = [
        source("walmart", Some("19.99")),
        source("target", Some("15.50")),
        source("kroger", None),
    ];
    let (status, json) = send(app(state(&sources)), "GET", "/api/v1/prices/milk").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "partial");
    assert_eq!(json["cached"], false);
    let prices: Vec<&str> = json["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|q| q["price"].as_str().expect("price string"))
        .collect();
    assert_eq!(prices, vec!["15.50", "19.99"]);
    assert_eq!(json["failures"][0]["source"], "kroger");
    assert_eq!(json["failures"][0]["kind"], "network_error");
}

#[tokio::test]
async fn second_request_is_served_from_cache_until_refresh() {
    let walmart = source("walmart", Some("2.00"));
    let state = state(&[Arc::clone(&walmart)]);

    let (_, first) = send(app(state.clone()), "GET", "/api/v1/prices/Milk").await;
    assert_eq!(first["cached"], false);

    let (_, second) = send(app(state.clone()), "GET", "/api/v1/prices/milk").await;
    assert_eq!(second["cached"], true);
    assert_eq!(walmart.calls.load(Ordering::SeqCst), 1);

    let (_, refreshed) = send(app(state), "GET", "/api/v1/prices/milk?refresh=true").await;
    assert_eq!(refreshed["cached"], false);
    assert_eq!(walmart.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn blank_product_is_bad_request_without_source_calls() {
    let walmart = source("walmart", Some("2.00"));
    let (status, json) = send(
        app(state(&[Arc::clone(&walmart)])),
        "GET",
        "/api/v1/prices/%20%20",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "bad_request");
    assert_eq!(walmart.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn all_sources_failing_is_bad_gateway_and_not_cached() {
    let state = state(&[source("walmart", None), source("kroger", None)]);
    let (status, json) = send(app(state.clone()), "GET", "/api/v1/prices/milk").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "all_sources_failed");
    assert_eq!(json["failures"].as_array().map(Vec::len), Some(2));
    assert!(state.cache.is_empty());
}

#[tokio::test]
async fn no_configured_sources_is_service_unavailable() {
    let (status, json) = send(app(state(&[])), "GET", "/api/v1/prices/milk").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "no_sources");
}

#[tokio::test]
async fn empty_results_are_no_prices_not_an_error() {
    let (status, json) = send(
        app(state(&[source("walmart", Some("free"))])),
        "GET",
        "/api/v1/prices/milk",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "no_prices");
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn single_source_route_queries_only_that_source() {
    let walmart = source("walmart", Some("3.00"));
    let target = source("target", Some("1.00"));
    let state = state(&[Arc::clone(&walmart), Arc::clone(&target)]);

    let (status, json) = send(app(state.clone()), "GET", "/api/v1/prices/walmart/milk").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["store"], "walmart");
    assert_eq!(target.calls.load(Ordering::SeqCst), 0);

    let (status, json) = send(app(state), "GET", "/api/v1/prices/tesco/milk").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn sources_lists_registered_adapters() {
    let (status, json) = send(
        app(state(&[source("walmart", None), source("target", None)])),
        "GET",
        "/api/v1/sources",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][1]["id"], "target");
}

#[tokio::test]
async fn cache_routes_invalidate_and_clear() {
    let state = state(&[source("walmart", Some("2.00"))]);
    send(app(state.clone()), "GET", "/api/v1/prices/milk").await;
    send(app(state.clone()), "GET", "/api/v1/prices/eggs").await;
    assert_eq!(state.cache.len(), 2);

    let (status, json) = send(app(state.clone()), "DELETE", "/api/v1/cache/MILK").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["removed"], true);

    let (_, json) = send(app(state.clone()), "DELETE", "/api/v1/cache").await;
    assert_eq!(json["data"]["cleared"], 1);
    assert!(state.cache.is_empty());
}

#[tokio::test]
async fn protected_routes_require_bearer_token_when_enabled() {
    let app = build_app(
        state(&[source("walmart", Some("2.00"))]),
        AuthState::from_keys("secret", false).expect("auth"),
        default_rate_limit_state(),
    );

    let (status, json) = send(app.clone(), "GET", "/api/v1/sources").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/sources")
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_rejects_requests_beyond_the_window() {
    let app = build_app(
        state(&[]),
        AuthState::disabled(),
        RateLimitState::new(1, Duration::from_secs(60)),
    );
    let (first, _) = send(app.clone(), "GET", "/api/v1/sources").await;
    let (second, json) = send(app, "GET", "/api/v1/sources").await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
}

#[tokio::test]
async fn cache_served_prices_do_not_spend_the_rate_limit() {
    let walmart = source("walmart", Some("2.00"));
    let app = build_app(
        state(&[Arc::clone(&walmart)]),
        AuthState::disabled(),
        RateLimitState::new(2, Duration::from_secs(60)),
    );

    let (status, json) = send(app.clone(), "GET", "/api/v1/prices/milk").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cached"], false);
    for _ in 0..3 {
        let (status, json) = send(app.clone(), "GET", "/api/v1/prices/milk").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["cached"], true);
    }

    let (status, _) = send(app.clone(), "GET", "/api/v1/prices/eggs").await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = send(app, "GET", "/api/v1/prices/bread").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
    assert_eq!(walmart.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn each_api_key_has_its_own_rate_limit_window() {
    let app = build_app(
        state(&[]),
        AuthState::from_keys("alpha,beta", false).expect("auth"),
        RateLimitState::new(1, Duration::from_secs(60)),
    );
    let as_client = |token: &str| {
        Request::builder()
            .uri("/api/v1/sources")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request")
    };

    let first = app.clone().oneshot(as_client("alpha")).await.expect("response");
    let repeat = app.clone().oneshot(as_client("alpha")).await.expect("response");
    let other = app.oneshot(as_client("beta")).await.expect("response");
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn rejected_tokens_do_not_spend_the_rate_limit() {
    let app = build_app(
        state(&[]),
        AuthState::from_keys("alpha", false).expect("auth"),
        RateLimitState::new(1, Duration::from_secs(60)),
    );
    let (status, _) = send(app.clone(), "GET", "/api/v1/sources").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/sources")
                .header("authorization", "Bearer alpha")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
