#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use refund_sync::auth::{PermissionGate, PgRoleDirectory};
use refund_sync::cases::{CaseService, CaseServiceSettings};
use refund_sync::data::PgCorrelationStore;
use refund_sync::reconcile::{PipelineSettings, RefreshPipeline};
use refund_sync::sync::{BackfillJob, BackfillSettings};
use refund_sync::upstream::{FetchError, StatusPayload, StatusSource};
use sqlx::PgPool;

pub const EDITOR: i64 = 100;
pub const VIEWER: i64 = 200;

/// Scripted upstream keyed by URL. Unknown URLs fail with a 404.
#[derive(Default)]
pub struct FakeUpstream {
    responses: HashMap<String, Result<(Option<&'static str>, Option<&'static str>), ()>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codes(
        mut self,
        url: &str,
        status: Option<&'static str>,
        refund_status: Option<&'static str>,
    ) -> Self {
        self.responses
            .insert(url.to_owned(), Ok((status, refund_status)));
        self
    }

    pub fn timing_out(mut self, url: &str) -> Self {
        self.responses.insert(url.to_owned(), Err(()));
        self
    }
}

#[async_trait]
impl StatusSource for FakeUpstream {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<StatusPayload, FetchError> {
        match self.responses.get(url) {
            Some(Ok((status, refund))) => Ok(StatusPayload::from_codes(*status, *refund)),
            Some(Err(())) => Err(FetchError::Timeout {
                url: url.to_owned(),
                timeout,
            }),
            None => Err(FetchError::Status {
                url: url.to_owned(),
                status: 404,
            }),
        }
    }
}

/// Wire a `CaseService` against `pool` with fast pacing and the standard allow-list.
pub fn build_service(pool: &PgPool, upstream: FakeUpstream) -> CaseService {
    build_service_with_template(pool, upstream, None)
}

pub fn build_service_with_template(
    pool: &PgPool,
    upstream: FakeUpstream,
    status_url_template: Option<&str>,
) -> CaseService {
    let source: Arc<dyn StatusSource> = Arc::new(upstream);
    let pipeline = RefreshPipeline::new(
        source.clone(),
        PipelineSettings {
            wave_size: 10,
            wave_pause: Duration::from_millis(1),
            fetch_timeout: Duration::from_millis(50),
        },
    );
    let gate = PermissionGate::new(Arc::new(PgRoleDirectory::new(pool.clone())), [1, 3, 4]);
    let backfill = Arc::new(build_backfill(pool, 100));

    CaseService::new(
        pool.clone(),
        pipeline,
        source,
        gate,
        backfill,
        CaseServiceSettings {
            refresh_timeout: Duration::from_millis(50),
            status_url_template: status_url_template.map(str::to_owned),
        },
    )
}

pub fn build_backfill(pool: &PgPool, chunk_size: usize) -> BackfillJob {
    BackfillJob::new(
        Arc::new(PgCorrelationStore::new(pool.clone(), "1688", 3)),
        BackfillSettings {
            limit: 1000,
            chunk_size,
            chunk_pause: Duration::from_millis(1),
        },
    )
}

/// Insert a principal with an editor role and one without.
pub async fn seed_principals(pool: &PgPool) {
    for (id, name, roles) in [(EDITOR, "Alice", vec![1_i64]), (VIEWER, "Bob", vec![2, 5])] {
        sqlx::query("INSERT INTO principals (id, display_name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(pool)
            .await
            .expect("failed to insert principal");
        for role in roles {
            sqlx::query("INSERT INTO principal_roles (principal_id, role_id) VALUES ($1, $2)")
                .bind(id)
                .bind(role)
                .execute(pool)
                .await
                .expect("failed to insert principal role");
        }
    }
}

/// Insert a case. `age_minutes` pushes `created_at` into the past so list order is predictable.
pub async fn insert_case(
    pool: &PgPool,
    order_id: &str,
    status_query_url: Option<&str>,
    order_status: Option<&str>,
    age_minutes: i32,
) {
    sqlx::query(
        r#"
        INSERT INTO tracked_cases (order_id, status_query_url, requested_order_status, created_at)
        VALUES ($1, $2, $3, NOW() - make_interval(mins => $4))
        "#,
    )
    .bind(order_id)
    .bind(status_query_url)
    .bind(order_status)
    .bind(age_minutes)
    .execute(pool)
    .await
    .expect("failed to insert case");
}

pub async fn insert_source(
    pool: &PgPool,
    order_ref: &str,
    channel: &str,
    purchase_order_number: Option<&str>,
    logistics_tracking_number: Option<&str>,
    age_days: i32,
) {
    sqlx::query(
        r#"
        INSERT INTO correlation_sources
            (order_ref, channel, purchase_order_number, logistics_tracking_number, created_at)
        VALUES ($1, $2, $3, $4, NOW() - make_interval(days => $5))
        "#,
    )
    .bind(order_ref)
    .bind(channel)
    .bind(purchase_order_number)
    .bind(logistics_tracking_number)
    .bind(age_days)
    .execute(pool)
    .await
    .expect("failed to insert correlation source");
}

pub async fn set_purchase_order(pool: &PgPool, order_id: &str, po: &str) {
    sqlx::query("UPDATE tracked_cases SET purchase_order_number = $2 WHERE order_id = $1")
        .bind(order_id)
        .bind(po)
        .execute(pool)
        .await
        .expect("failed to set purchase order");
}

pub async fn stored_column(pool: &PgPool, order_id: &str, column: &str) -> Option<String> {
    sqlx::query_scalar::<_, Option<String>>(&format!(
        "SELECT {column} FROM tracked_cases WHERE order_id = $1"
    ))
    .bind(order_id)
    .fetch_one(pool)
    .await
    .expect("failed to read column")
}

pub async fn case_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM tracked_cases")
        .fetch_one(pool)
        .await
        .expect("failed to count cases")
}
