//! JSON error envelope returned by every API handler.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;
use ts_rs::TS;

use crate::cases::CaseError;
use crate::sync::BackfillError;
use crate::upstream::FetchError;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ApiErrorCode {
    Forbidden,
    BadRequest,
    NotFound,
    Conflict,
    UpstreamError,
    InternalError,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::UpstreamError => StatusCode::BAD_GATEWAY,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Forbidden, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Conflict, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::UpstreamError, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Log a database failure and hide its details from the caller.
pub fn db_error(context: &str, e: sqlx::Error) -> ApiError {
    error!(error = ?e, context, "Database error");
    ApiError::internal_error(format!("{context} failed"))
}

fn fetch_error(e: FetchError) -> ApiError {
    match &e {
        FetchError::InvalidUrl { .. } => ApiError::bad_request(e.to_string()),
        _ => ApiError::upstream(e.to_string()),
    }
}

impl From<CaseError> for ApiError {
    fn from(e: CaseError) -> Self {
        match e {
            CaseError::PermissionDenied => ApiError::forbidden(e.to_string()),
            CaseError::Validation(message) => ApiError::bad_request(message),
            CaseError::NotFound(_) => ApiError::not_found(e.to_string()),
            CaseError::MissingStatusUrl(_) => ApiError::bad_request(e.to_string()),
            CaseError::NotConfigured(_) => ApiError::conflict(e.to_string()),
            CaseError::Fetch(fetch) => fetch_error(fetch),
            CaseError::Backfill(BackfillError::AlreadyRunning) => {
                ApiError::conflict(BackfillError::AlreadyRunning.to_string())
            }
            CaseError::Backfill(BackfillError::Select(e)) => db_error("Backfill candidate selection", e),
            CaseError::Database(e) => db_error("Case query", e),
        }
    }
}
