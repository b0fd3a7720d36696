//! Scheduled synchronization jobs.

pub mod backfill;
pub mod scheduler;

pub use backfill::{BackfillError, BackfillJob, BackfillReport, BackfillSettings, ChunkFailure};
pub use scheduler::{DailyJob, DailyScheduler, Scheduler, next_run_after};
