//! Purchase-order correlation backfill.
//!
//! Selects a bounded set of cases still missing a purchase-order number and
//! copies the correlation fields over in sequential chunks. Each chunk is its
//! own transaction; a failed chunk is logged and the run moves on. The job is
//! stateless and idempotent, so re-running after a partial failure simply
//! picks up the remaining rows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, error, info};

use crate::data::CorrelationStore;
use crate::utils::fmt_duration;

#[derive(Debug, Clone, Copy)]
pub struct BackfillSettings {
    /// Maximum rows selected per run.
    pub limit: i64,
    pub chunk_size: usize,
    pub chunk_pause: Duration,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            limit: 1000,
            chunk_size: 100,
            chunk_pause: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error("a backfill run is already in progress")]
    AlreadyRunning,
    #[error("failed to select backfill candidates")]
    Select(#[source] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub index: usize,
    pub rows: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub selected: usize,
    /// Rows actually changed across all successful chunks.
    pub updated: u64,
    pub chunks_applied: usize,
    pub failed_chunks: Vec<ChunkFailure>,
}

pub struct BackfillJob {
    store: Arc<dyn CorrelationStore>,
    settings: BackfillSettings,
    running: Mutex<()>,
}

impl BackfillJob {
    pub fn new(store: Arc<dyn CorrelationStore>, settings: BackfillSettings) -> Self {
        let settings = BackfillSettings {
            chunk_size: settings.chunk_size.max(1),
            ..settings
        };
        Self {
            store,
            settings,
            running: Mutex::new(()),
        }
    }

    /// Execute one backfill pass.
    ///
    /// Returns [`BackfillError::AlreadyRunning`] without touching storage when
    /// another pass holds the single-flight guard.
    pub async fn run(&self) -> Result<BackfillReport, BackfillError> {
        let Ok(_guard) = self.running.try_lock() else {
            return Err(BackfillError::AlreadyRunning);
        };

        let start = Instant::now();
        let order_ids = self
            .store
            .select_candidates(self.settings.limit)
            .await
            .map_err(BackfillError::Select)?;

        let mut report = BackfillReport {
            selected: order_ids.len(),
            ..Default::default()
        };

        if order_ids.is_empty() {
            debug!("No cases awaiting correlation backfill");
            return Ok(report);
        }

        for (index, chunk) in order_ids.chunks(self.settings.chunk_size).enumerate() {
            if index > 0 && !self.settings.chunk_pause.is_zero() {
                time::sleep(self.settings.chunk_pause).await;
            }

            match self.store.apply_chunk(chunk).await {
                Ok(updated) => {
                    debug!(chunk = index, rows = chunk.len(), updated, "Backfill chunk applied");
                    report.updated += updated;
                    report.chunks_applied += 1;
                }
                Err(e) => {
                    error!(chunk = index, rows = chunk.len(), error = ?e, "Backfill chunk failed, continuing");
                    report.failed_chunks.push(ChunkFailure {
                        index,
                        rows: chunk.len(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            selected = report.selected,
            updated = report.updated,
            chunks_applied = report.chunks_applied,
            chunks_failed = report.failed_chunks.len(),
            duration = fmt_duration(start.elapsed()),
            "Correlation backfill finished"
        );

        Ok(report)
    }
}
