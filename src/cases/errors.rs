use crate::sync::BackfillError;
use crate::upstream::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("principal is not allowed to modify cases")]
    PermissionDenied,
    #[error("{0}")]
    Validation(String),
    #[error("case {0} not found")]
    NotFound(String),
    #[error("case {0} has no status query url")]
    MissingStatusUrl(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Backfill(#[from] BackfillError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
