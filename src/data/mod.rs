//! Database models and queries.

pub mod cases;
pub mod correlation;
pub mod filters;

pub use cases::{CaseEdit, ProgressStage, TrackedCase};
pub use correlation::{CorrelationStore, PgCorrelationStore};
pub use filters::{CaseFilter, FILTER_COLUMNS, FilterColumn, MatchKind};
