use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::app::AppState;

use super::dto::{BulkRequest, BulkResponse};
use super::error::{ERR_VALIDATION, Problem, error_response};

/// Response header reporting whether a read was served from cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";
/// Response header with the remaining TTL in whole seconds.
pub const CACHE_TTL_HEADER: &str = "x-cache-ttl";
/// Request header forcing a fresh upstream read (still refreshes the cache).
pub const CACHE_BYPASS_HEADER: &str = "x-cache-bypass";

/// Read handler for `GET /tracker/v1/fetch/{endpoint}`.
///
/// All request query parameters are offered to the resolver; undeclared
/// ones are dropped there.
#[utoipa::path(
    get,
    path = "/tracker/v1/fetch/{endpoint}",
    params(("endpoint" = String, Path, description = "Endpoint id, e.g. issues.get")),
    responses(
        (status = 200, description = "Upstream value, with x-cache/x-cache-ttl headers"),
        (status = 400, description = "Missing or invalid parameter"),
        (status = 404, description = "Unknown endpoint or upstream resource"),
    )
)]
pub async fn fetch_handler(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let instance = format!("/tracker/v1/fetch/{endpoint}");
    let bypass = headers
        .get(CACHE_BYPASS_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| matches!(v, "1" | "true"));

    match state.gateway.fetch(&endpoint, &params, bypass).await {
        Ok(outcome) => {
            let ttl_secs = outcome.ttl_remaining.as_secs();
            let mut response = Json(outcome.value).into_response();
            let headers = response.headers_mut();
            headers.insert(
                CACHE_STATUS_HEADER,
                HeaderValue::from_static(outcome.cache.as_str()),
            );
            if let Ok(value) = HeaderValue::from_str(&ttl_secs.to_string()) {
                headers.insert(CACHE_TTL_HEADER, value);
            }
            response
        }
        Err(err) => error_response(err, &instance),
    }
}

/// Single mutation handler for `POST /tracker/v1/mutate/{endpoint}`.
#[utoipa::path(
    post,
    path = "/tracker/v1/mutate/{endpoint}",
    params(("endpoint" = String, Path, description = "Endpoint id, e.g. issues.set_status")),
    responses(
        (status = 200, description = "Upstream result"),
        (status = 400, description = "Missing or invalid parameter"),
        (status = 404, description = "Unknown endpoint or upstream resource"),
    )
)]
pub async fn mutate_handler(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(payload): Json<Value>,
) -> Response {
    let instance = format!("/tracker/v1/mutate/{endpoint}");
    match state.gateway.mutate(&endpoint, &params, &payload).await {
        Ok(value) => Json(value).into_response(),
        Err(err) => error_response(err, &instance),
    }
}

/// Bulk handler for `POST /tracker/v1/issues/bulk`.
///
/// Partial failure is a 200 with per-item detail; only a batch that cannot
/// be scheduled at all is an error status.
#[utoipa::path(
    post,
    path = "/tracker/v1/issues/bulk",
    request_body = BulkRequest,
    responses(
        (status = 200, description = "Per-item results and errors", body = BulkResponse),
        (status = 400, description = "Empty batch"),
        (status = 503, description = "Batch could not be scheduled"),
    )
)]
pub async fn bulk_handler(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> Response {
    let instance = "/tracker/v1/issues/bulk";
    if request.operations.is_empty() {
        return Problem::new(
            StatusCode::BAD_REQUEST,
            ERR_VALIDATION,
            "Validation Error",
            "operations must not be empty",
        )
        .with_instance(instance)
        .into_response();
    }

    let operations = request.operations.into_iter().map(Into::into).collect();
    let cancel = CancellationToken::new();
    match state.bulk.execute(operations, &cancel).await {
        Ok(report) => (StatusCode::OK, Json(BulkResponse::from(report))).into_response(),
        Err(err) => error_response(err, instance),
    }
}
