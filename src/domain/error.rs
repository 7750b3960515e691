use thiserror::Error;

use super::registry::RegistryError;

/// Errors from endpoint lookup and path resolution. These are caller or
/// configuration bugs: fatal to the single call, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown endpoint '{id}'")]
    UnknownEndpoint { id: String },

    #[error("endpoint '{endpoint}' has no template for surface '{surface}'")]
    UnknownSurface { endpoint: String, surface: String },

    #[error("missing required parameter '{name}'")]
    MissingParameter { name: String },

    #[error("invalid value for parameter '{name}': {detail}")]
    InvalidParameter { name: String, detail: String },
}

/// Typed failure taxonomy of the upstream single-item handler. Surfaced
/// verbatim for single calls; captured per-item for bulk calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("not found: {detail}")]
    NotFound { detail: String },

    #[error("validation: {detail}")]
    Validation { detail: String },

    #[error("upstream server error (status {status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("network: {detail}")]
    Network { detail: String },

    #[error("request timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },
}

/// Service-layer error umbrella. Cache backend trouble never appears here:
/// the facade absorbs it and falls back to the local store.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("batch dispatch failed: {detail}")]
    BatchDispatch { detail: String },

    #[error("internal: {message}")]
    Internal { message: String },
}

impl GatewayError {
    #[must_use]
    pub fn batch_dispatch(detail: impl Into<String>) -> Self {
        Self::BatchDispatch {
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<RegistryError> for GatewayError {
    fn from(e: RegistryError) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}
