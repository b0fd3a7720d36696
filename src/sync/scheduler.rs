//! Wall-clock daily scheduling.
//!
//! Jobs are registered through the [`Scheduler`] trait so their bodies can be
//! exercised without waiting on the clock. [`DailyScheduler`] is the runtime
//! implementation: one tokio task per registration, each sleeping until the
//! next local occurrence of its time of day.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::services::Service;

/// A job body. Called once per firing; the returned future runs to completion
/// before the next firing is computed, so a single registration never overlaps
/// with itself.
pub type DailyJob = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub trait Scheduler {
    fn register_daily(&mut self, name: &'static str, at: NaiveTime, zone: Tz, job: DailyJob);
}

struct Registration {
    name: &'static str,
    at: NaiveTime,
    zone: Tz,
    job: DailyJob,
}

#[derive(Default)]
pub struct DailyScheduler {
    registrations: Vec<Registration>,
}

impl DailyScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    async fn run_registration(registration: Registration, cancel: CancellationToken) {
        let Registration {
            name,
            at,
            zone,
            job,
        } = registration;

        loop {
            let now = Utc::now();
            let next = next_run_after(now, at, zone);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(job = name, next_run = %next.with_timezone(&zone), "Scheduled next run");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep(wait) => {}
            }

            info!(job = name, "Running scheduled job");
            tokio::select! {
                _ = cancel.cancelled() => {
                    trace!(job = name, "Scheduled job cancelled mid-run");
                    break;
                }
                _ = job() => {}
            }
        }
    }
}

impl Scheduler for DailyScheduler {
    fn register_daily(&mut self, name: &'static str, at: NaiveTime, zone: Tz, job: DailyJob) {
        info!(job = name, at = %at.format("%H:%M"), zone = %zone, "Registered daily job");
        self.registrations.push(Registration {
            name,
            at,
            zone,
            job,
        });
    }
}

#[async_trait]
impl Service for DailyScheduler {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let handles: Vec<JoinHandle<()>> = self
            .registrations
            .drain(..)
            .map(|registration| tokio::spawn(Self::run_registration(registration, cancel.clone())))
            .collect();

        info!(jobs = handles.len(), "Scheduler service started");
        let _ = shutdown_rx.recv().await;
        cancel.cancel();

        for handle in handles {
            if time::timeout(Duration::from_secs(5), handle).await.is_err() {
                warn!("Scheduled job did not stop within 5s, abandoning");
            }
        }
        info!("Scheduler exiting gracefully");
        Ok(())
    }
}

/// The first instant strictly after `now` whose wall-clock time in `zone` is `at`.
///
/// A time skipped by a DST gap resolves to the same offset one hour later; an
/// ambiguous time resolves to its earlier occurrence.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime, zone: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&zone).date_naive();

    for offset in 0..=2 {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = resolve_local(zone, date.and_time(at))
            && candidate > now
        {
            return candidate;
        }
    }

    now + chrono::Duration::days(1)
}

fn resolve_local(zone: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => zone
            .from_local_datetime(&(local + chrono::Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}
