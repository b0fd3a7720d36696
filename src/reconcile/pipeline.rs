//! Wave-bounded fetch → translate → persist over a page of cases.
//!
//! Qualifying cases are split into waves of at most `wave_size`. A wave's
//! fetches run concurrently and the next wave starts only after every fetch
//! in the current one has settled, with `wave_pause` in between. Fetch
//! failures are recorded in the report and never abort the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use sqlx::PgPool;
use tokio::time;
use tracing::{debug, warn};

use crate::data::TrackedCase;
use crate::data::cases;
use crate::status::{translate_order_status, translate_refund_status};
use crate::upstream::{FetchError, StatusPayload, StatusSource};
use crate::utils::fmt_duration;

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Maximum concurrent fetches.
    pub wave_size: usize,
    pub wave_pause: Duration,
    pub fetch_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            wave_size: 10,
            wave_pause: Duration::from_millis(200),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

/// Translated labels for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub order_id: String,
    pub order_status: String,
    pub refund_status: String,
}

#[derive(Debug)]
pub struct SkippedFetch {
    pub order_id: String,
    pub error: FetchError,
}

/// Outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub updates: Vec<StatusUpdate>,
    pub skipped: Vec<SkippedFetch>,
    pub waves: usize,
}

impl RefreshReport {
    /// Overlay refreshed labels onto `rows` by order id. Rows without an
    /// update are left as they are.
    pub fn apply_to(&self, rows: &mut [TrackedCase]) {
        if self.updates.is_empty() {
            return;
        }
        let by_id: HashMap<&str, &StatusUpdate> = self
            .updates
            .iter()
            .map(|u| (u.order_id.as_str(), u))
            .collect();
        for row in rows {
            if let Some(update) = by_id.get(row.order_id.as_str()) {
                row.requested_order_status = Some(update.order_status.clone());
                row.requested_refund_status = Some(update.refund_status.clone());
            }
        }
    }

    pub fn skipped_ids(&self) -> Vec<&str> {
        self.skipped.iter().map(|s| s.order_id.as_str()).collect()
    }
}

pub struct RefreshPipeline {
    source: Arc<dyn StatusSource>,
    settings: PipelineSettings,
}

impl RefreshPipeline {
    pub fn new(source: Arc<dyn StatusSource>, settings: PipelineSettings) -> Self {
        let settings = PipelineSettings {
            wave_size: settings.wave_size.max(1),
            ..settings
        };
        Self { source, settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// One fetch, bounded by `timeout` even if the source ignores it.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<StatusPayload, FetchError> {
        match time::timeout(timeout, self.source.fetch(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_owned(),
                timeout,
            }),
        }
    }

    /// Fetch and translate statuses for every case in `rows` that has a query URL.
    pub async fn collect(&self, rows: &[TrackedCase]) -> RefreshReport {
        let targets: Vec<(&str, &str)> = rows
            .iter()
            .filter_map(|row| row.query_url().map(|url| (row.order_id.as_str(), url)))
            .collect();

        let mut report = RefreshReport::default();
        if targets.is_empty() {
            return report;
        }

        let start = Instant::now();
        let timeout = self.settings.fetch_timeout;

        for (wave, batch) in targets.chunks(self.settings.wave_size).enumerate() {
            if wave > 0 && !self.settings.wave_pause.is_zero() {
                time::sleep(self.settings.wave_pause).await;
            }

            let results = join_all(
                batch
                    .iter()
                    .map(|&(order_id, url)| async move { (order_id, self.fetch(url, timeout).await) }),
            )
            .await;

            for (order_id, result) in results {
                match result {
                    Ok(payload) => report.updates.push(StatusUpdate {
                        order_id: order_id.to_owned(),
                        order_status: translate_order_status(payload.order_status()).to_owned(),
                        refund_status: translate_refund_status(payload.refund_status()).to_owned(),
                    }),
                    Err(error) => {
                        warn!(
                            order_id,
                            wave,
                            url = error.url(),
                            kind = error.kind(),
                            error = %error,
                            "Status fetch failed, keeping stored value"
                        );
                        report.skipped.push(SkippedFetch {
                            order_id: order_id.to_owned(),
                            error,
                        });
                    }
                }
            }
            report.waves += 1;
        }

        debug!(
            targets = targets.len(),
            refreshed = report.updates.len(),
            skipped = report.skipped.len(),
            waves = report.waves,
            duration = fmt_duration(start.elapsed()),
            "Status refresh collected"
        );
        report
    }

    /// Collect, persist the updates in a single transaction, then overlay them
    /// onto `rows`.
    ///
    /// Only a persistence failure is returned as an error; in that case `rows`
    /// is left untouched.
    pub async fn refresh_page(
        &self,
        pool: &PgPool,
        rows: &mut [TrackedCase],
    ) -> Result<RefreshReport, sqlx::Error> {
        let report = self.collect(rows).await;
        if report.updates.is_empty() {
            return Ok(report);
        }

        cases::apply_status_updates(pool, &report.updates).await?;
        report.apply_to(rows);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted source: URLs containing "timeout" or "broken" fail, the rest
    /// return `success` / `REFUND_SUCCESS`. Tracks peak concurrency.
    #[derive(Default)]
    struct ScriptedSource {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch(&self, url: &str, timeout: Duration) -> Result<StatusPayload, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(url.to_owned());
            time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if url.contains("timeout") {
                Err(FetchError::Timeout {
                    url: url.to_owned(),
                    timeout,
                })
            } else if url.contains("broken") {
                Err(FetchError::Status {
                    url: url.to_owned(),
                    status: 502,
                })
            } else {
                Ok(StatusPayload::from_codes(Some("success"), Some("REFUND_SUCCESS")))
            }
        }
    }

    fn case(order_id: &str, url: Option<&str>, order_status: Option<&str>) -> TrackedCase {
        TrackedCase {
            order_id: order_id.into(),
            recipient_name: "Recipient".into(),
            buyer_account: "buyer".into(),
            status_query_url: url.map(Into::into),
            requested_order_status: order_status.map(Into::into),
            requested_refund_status: None,
            progress_tracking: None,
            purchase_order_number: None,
            logistics_tracking_number: None,
            follow_up_note: None,
            diff_order_detail: None,
            follow_up_image_ref: None,
            follow_up_by: None,
            follow_up_at: None,
            created_at: Utc::now(),
        }
    }

    fn pipeline(source: Arc<ScriptedSource>, wave_size: usize) -> RefreshPipeline {
        RefreshPipeline::new(
            source,
            PipelineSettings {
                wave_size,
                wave_pause: Duration::from_millis(1),
                fetch_timeout: Duration::from_millis(50),
            },
        )
    }

    #[tokio::test]
    async fn test_rows_without_url_are_a_no_op() {
        let source = Arc::new(ScriptedSource::default());
        let rows = vec![case("1", None, None), case("2", Some("  "), None)];

        let report = pipeline(source.clone(), 10).collect(&rows).await;

        assert!(report.updates.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(report.waves, 0);
        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wave_fills_but_never_exceeds_ceiling() {
        let source = Arc::new(ScriptedSource::default());
        let rows: Vec<_> = (0..25)
            .map(|i| case(&i.to_string(), Some(&format!("https://up.test/{i}")), None))
            .collect();

        let report = pipeline(source.clone(), 10).collect(&rows).await;

        assert_eq!(report.waves, 3);
        assert_eq!(report.updates.len(), 25);
        assert_eq!(source.calls.lock().unwrap().len(), 25);
        assert_eq!(source.peak.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_skipped_and_keeps_stored_value() {
        let source = Arc::new(ScriptedSource::default());
        let mut rows = vec![
            case("ok", Some("https://up.test/ok"), Some("A")),
            case("slow", Some("https://up.test/timeout"), Some("A")),
            case("bad", Some("https://up.test/broken"), Some("B")),
        ];

        let report = pipeline(source, 10).collect(&rows).await;
        report.apply_to(&mut rows);

        assert_eq!(report.updates.len(), 1);
        let skipped: HashSet<&str> = report.skipped_ids().into_iter().collect();
        assert_eq!(skipped, HashSet::from(["slow", "bad"]));
        assert!(matches!(
            report.skipped.iter().find(|s| s.order_id == "slow").unwrap().error,
            FetchError::Timeout { .. }
        ));

        assert_eq!(rows[0].requested_order_status.as_deref(), Some("completed"));
        assert_eq!(rows[0].requested_refund_status.as_deref(), Some("refund succeeded"));
        assert_eq!(rows[1].requested_order_status.as_deref(), Some("A"));
        assert_eq!(rows[2].requested_order_status.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_apply_to_merges_by_key_not_position() {
        let report = RefreshReport {
            updates: vec![StatusUpdate {
                order_id: "b".into(),
                order_status: "cancelled".into(),
                refund_status: "refund closed".into(),
            }],
            ..Default::default()
        };
        let mut rows = vec![case("a", None, Some("x")), case("b", None, Some("y"))];
        report.apply_to(&mut rows);
        assert_eq!(rows[0].requested_order_status.as_deref(), Some("x"));
        assert_eq!(rows[1].requested_order_status.as_deref(), Some("cancelled"));
    }

    struct HangingSource;

    #[async_trait]
    impl StatusSource for HangingSource {
        async fn fetch(&self, _url: &str, _timeout: Duration) -> Result<StatusPayload, FetchError> {
            time::sleep(Duration::from_secs(30)).await;
            Ok(StatusPayload::default())
        }
    }

    #[tokio::test]
    async fn test_source_ignoring_timeout_is_cut_off() {
        let pipeline = RefreshPipeline::new(
            Arc::new(HangingSource),
            PipelineSettings {
                wave_size: 10,
                wave_pause: Duration::ZERO,
                fetch_timeout: Duration::from_millis(20),
            },
        );
        let rows = vec![case("1", Some("https://up.test/1"), Some("A"))];

        let report = time::timeout(Duration::from_secs(5), pipeline.collect(&rows))
            .await
            .expect("pipeline must not wait on a hung fetch");

        assert!(report.updates.is_empty());
        assert!(matches!(report.skipped[0].error, FetchError::Timeout { .. }));
    }

    #[test]
    fn test_zero_wave_size_is_clamped() {
        let source = Arc::new(ScriptedSource::default());
        assert_eq!(pipeline(source, 0).settings().wave_size, 1);
    }
}
