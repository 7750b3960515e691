use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use serde::Serialize;

use crate::domain::error::{GatewayError, ResolveError, UpstreamError};

// ---------------------------------------------------------------------------
// Stable error type identifiers (part of the client contract)
// ---------------------------------------------------------------------------

pub(crate) const ERR_UNKNOWN_ENDPOINT: &str = "trackgw:error:unknown-endpoint";
pub(crate) const ERR_UNKNOWN_SURFACE: &str = "trackgw:error:unknown-surface";
pub(crate) const ERR_MISSING_PARAMETER: &str = "trackgw:error:missing-parameter";
pub(crate) const ERR_INVALID_PARAMETER: &str = "trackgw:error:invalid-parameter";
pub(crate) const ERR_VALIDATION: &str = "trackgw:error:validation";
pub(crate) const ERR_UPSTREAM_NOT_FOUND: &str = "trackgw:error:upstream-not-found";
pub(crate) const ERR_UPSTREAM: &str = "trackgw:error:upstream";
pub(crate) const ERR_UPSTREAM_TIMEOUT: &str = "trackgw:error:upstream-timeout";
pub(crate) const ERR_BATCH_DISPATCH: &str = "trackgw:error:batch-dispatch";
pub(crate) const ERR_INTERNAL: &str = "trackgw:error:internal";

// ---------------------------------------------------------------------------
// Problem
// ---------------------------------------------------------------------------

/// RFC 7807 problem document.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_id: String,
    pub status: u16,
    pub title: String,
    pub detail: String,
    pub instance: String,
}

impl Problem {
    #[must_use]
    pub fn new(
        status: StatusCode,
        type_id: &str,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            type_id: type_id.to_owned(),
            status: status.as_u16(),
            title: title.into(),
            detail: detail.into(),
            instance: String::new(),
        }
    }

    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

// ---------------------------------------------------------------------------
// GatewayError -> Problem
// ---------------------------------------------------------------------------

fn type_id(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::Resolve(ResolveError::UnknownEndpoint { .. }) => ERR_UNKNOWN_ENDPOINT,
        GatewayError::Resolve(ResolveError::UnknownSurface { .. }) => ERR_UNKNOWN_SURFACE,
        GatewayError::Resolve(ResolveError::MissingParameter { .. }) => ERR_MISSING_PARAMETER,
        GatewayError::Resolve(ResolveError::InvalidParameter { .. }) => ERR_INVALID_PARAMETER,
        GatewayError::Upstream(UpstreamError::NotFound { .. }) => ERR_UPSTREAM_NOT_FOUND,
        GatewayError::Upstream(UpstreamError::Validation { .. }) => ERR_VALIDATION,
        GatewayError::Upstream(
            UpstreamError::Server { .. } | UpstreamError::Network { .. },
        ) => ERR_UPSTREAM,
        GatewayError::Upstream(UpstreamError::Timeout { .. }) => ERR_UPSTREAM_TIMEOUT,
        GatewayError::BatchDispatch { .. } => ERR_BATCH_DISPATCH,
        GatewayError::Internal { .. } => ERR_INTERNAL,
    }
}

fn status_code(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Resolve(ResolveError::UnknownEndpoint { .. })
        | GatewayError::Upstream(UpstreamError::NotFound { .. }) => StatusCode::NOT_FOUND,
        GatewayError::Resolve(_)
        | GatewayError::Upstream(UpstreamError::Validation { .. }) => StatusCode::BAD_REQUEST,
        GatewayError::Upstream(
            UpstreamError::Server { .. } | UpstreamError::Network { .. },
        ) => StatusCode::BAD_GATEWAY,
        GatewayError::Upstream(UpstreamError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::BatchDispatch { .. } => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn title(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::Resolve(ResolveError::UnknownEndpoint { .. }) => "Unknown Endpoint",
        GatewayError::Resolve(ResolveError::UnknownSurface { .. }) => "Unknown Surface",
        GatewayError::Resolve(ResolveError::MissingParameter { .. }) => "Missing Parameter",
        GatewayError::Resolve(ResolveError::InvalidParameter { .. }) => "Invalid Parameter",
        GatewayError::Upstream(UpstreamError::NotFound { .. }) => "Not Found",
        GatewayError::Upstream(UpstreamError::Validation { .. }) => "Validation Error",
        GatewayError::Upstream(
            UpstreamError::Server { .. } | UpstreamError::Network { .. },
        ) => "Upstream Error",
        GatewayError::Upstream(UpstreamError::Timeout { .. }) => "Upstream Timeout",
        GatewayError::BatchDispatch { .. } => "Batch Dispatch Failed",
        GatewayError::Internal { .. } => "Internal Error",
    }
}

impl From<GatewayError> for Problem {
    fn from(err: GatewayError) -> Self {
        Self::new(status_code(&err), type_id(&err), title(&err), err.to_string())
    }
}

/// Convert a `GatewayError` into an axum response, filling in the request
/// `instance`.
pub fn error_response(err: GatewayError, instance: &str) -> Response {
    Problem::from(err).with_instance(instance).into_response()
}
