use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use pricecrawl_core::{PriceQuote, SourceFailure};
use pricecrawl_crawler::{AggregateReport, CrawlerError, QueryStatus, SourceInfo};
use serde::{Deserialize, Serialize};

use crate::middleware::{RequestId, ServedFromCache};

use super::{status_for_code, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct PriceResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<QueryStatus>,
    data: Vec<PriceQuote>,
    failures: Vec<SourceFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    captured_at: Option<DateTime<Utc>>,
    meta: ResponseMeta,
}

impl PriceResponse {
    fn ok(
        report: AggregateReport,
        cached: bool,
        captured_at: Option<DateTime<Utc>>,
        request_id: String,
    ) -> Self {
        Self {
            success: true,
            status: Some(report.status()),
            data: report.quotes,
            failures: report.failures,
            code: None,
            error: None,
            cached,
            captured_at,
            meta: ResponseMeta::new(request_id),
        }
    }

    fn failed(error: CrawlerError, request_id: String) -> Self {
        let code = match &error {
            CrawlerError::InvalidInput { .. } => "bad_request",
            CrawlerError::UnknownSource(_) => "not_found",
            CrawlerError::AllSourcesFailed { .. } => "all_sources_failed",
            CrawlerError::NoSources => "no_sources",
            CrawlerError::Build { .. } => "internal_error",
        };
        let message = error.to_string();
        let failures = match error {
            CrawlerError::AllSourcesFailed { failures } => failures,
            _ => Vec::new(),
        };
        Self {
            success: false,
            status: None,
            data: Vec::new(),
            failures,
            code: Some(code),
            error: Some(message),
            cached: false,
            captured_at: None,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl IntoResponse for PriceResponse {
    fn into_response(self) -> Response {
        let status = self.code.map_or(axum::http::StatusCode::OK, status_for_code);
        let cached = self.cached;
        let mut response = (status, Json(self)).into_response();
        if cached {
            response.extensions_mut().insert(ServedFromCache);
        }
        response
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct PriceQuery {
    #[serde(default)]
    refresh: bool,
}

/// `GET /api/v1/prices/{product}`: every source, served from the cache
/// unless `?refresh=true`.
pub(super) async fn get_prices(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product): Path<String>,
    Query(query): Query<PriceQuery>,
) -> PriceResponse {
    if !query.refresh {
        if let Some(entry) = state.cache.get(&product) {
            tracing::debug!(product = %product, "price query served from cache");
            return PriceResponse::ok(entry.report, true, Some(entry.captured_at), req_id.0);
        }
    }

    match state.aggregator.query(&product).await {
        Ok(report) => {
            let captured_at = state
                .cache
                .put(&product, report.clone())
                .map(|entry| entry.captured_at);
            PriceResponse::ok(report, false, captured_at, req_id.0)
        }
        Err(e) => {
            tracing::warn!(product = %product, error = %e, "price query failed");
            PriceResponse::failed(e, req_id.0)
        }
    }
}

/// `GET /api/v1/prices/{source}/{product}`: one source, never cached.
pub(super) async fn get_source_prices(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((source, product)): Path<(String, String)>,
) -> PriceResponse {
    match state.aggregator.query_source(&source, &product).await {
        Ok(report) => PriceResponse::ok(report, false, None, req_id.0),
        Err(e) => {
            tracing::warn!(source = %source, product = %product, error = %e, "source price query failed");
            PriceResponse::failed(e, req_id.0)
        }
    }
}

pub(super) async fn list_sources(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<SourceInfo>>> {
    Json(ApiResponse {
        data: state.aggregator.sources(),
        meta: ResponseMeta::new(req_id.0),
    })
}

#[derive(Debug, Serialize)]
pub(super) struct ClearedData {
    cleared: usize,
}

pub(super) async fn clear_cache(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<ClearedData>> {
    let cleared = state.cache.clear();
    tracing::info!(cleared, "price cache cleared");
    Json(ApiResponse {
        data: ClearedData { cleared },
        meta: ResponseMeta::new(req_id.0),
    })
}

#[derive(Debug, Serialize)]
pub(super) struct InvalidatedData {
    removed: bool,
}

pub(super) async fn invalidate_cached(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product): Path<String>,
) -> Json<ApiResponse<InvalidatedData>> {
    let removed = state.cache.invalidate(&product);
    Json(ApiResponse {
        data: InvalidatedData { removed },
        meta: ResponseMeta::new(req_id.0),
    })
}
