//! Liveness endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::trace;
use ts_rs::TS;

use crate::state::AppState;
use crate::web::error::{ApiError, db_error};

#[derive(Serialize, TS)]
#[ts(export)]
pub struct HealthResponse {
    status: String,
    version: String,
    commit: String,
    timestamp: String,
}

/// `GET /api/health`
///
/// Round-trips the database so a dead pool reports unhealthy.
pub(super) async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    trace!("health check requested");
    sqlx::query("SELECT 1")
        .execute(&state.db_pool)
        .await
        .map_err(|e| db_error("Health check", e))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        commit: env!("GIT_COMMIT_SHORT").to_owned(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}
