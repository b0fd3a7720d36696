//! Web API router construction.

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{cases, status};

/// Creates the web server router. `request_timeout` bounds every handler and
/// must outlast the slowest page refresh.
pub fn create_router(app_state: AppState, request_timeout: Duration) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/cases", get(cases::list_cases))
        .route(
            "/cases/{order_id}",
            delete(cases::delete_case).put(cases::update_case),
        )
        .route("/cases/batch-delete", post(cases::batch_delete))
        .route(
            "/cases/{order_id}/refresh-order-status",
            post(cases::refresh_order_status),
        )
        .route(
            "/cases/{order_id}/refresh-refund-status",
            post(cases::refresh_refund_status),
        )
        .route("/cases/sync", post(cases::sync_data))
        .route("/cases/auto-match", post(cases::auto_match))
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        RequestIdLayer,
        TraceLayer::new_for_http(),
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout),
    ))
}
