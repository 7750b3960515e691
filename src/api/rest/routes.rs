use axum::Router;
use axum::routing::{get, post};

use crate::app::AppState;

use super::handlers;

/// Assemble the gateway router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tracker/v1/fetch/{endpoint}", get(handlers::fetch_handler))
        .route("/tracker/v1/mutate/{endpoint}", post(handlers::mutate_handler))
        .route("/tracker/v1/issues/bulk", post(handlers::bulk_handler))
        .with_state(state)
}
