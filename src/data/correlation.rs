//! Reads and conditional writes for the purchase-order correlation backfill.
//!
//! `correlation_sources` is owned by the warehouse system. A case is eligible
//! while its purchase-order number is empty and the newest in-window source
//! row for the same (trimmed) order id has something to contribute.

use async_trait::async_trait;
use sqlx::PgPool;

/// Storage operations the backfill job needs.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Order ids of up to `limit` cases that can be backfilled right now.
    async fn select_candidates(&self, limit: i64) -> Result<Vec<String>, sqlx::Error>;

    /// Copy correlation fields onto the given cases in one transaction,
    /// returning how many rows changed.
    async fn apply_chunk(&self, order_ids: &[String]) -> Result<u64, sqlx::Error>;
}

/// Newest in-window source row per trimmed order reference.
/// `$1` is the channel, `$2` the window in months.
const LATEST_SOURCES: &str = r#"
    SELECT DISTINCT ON (TRIM(order_ref))
        TRIM(order_ref) AS order_ref,
        purchase_order_number,
        logistics_tracking_number
    FROM correlation_sources
    WHERE channel = $1
      AND created_at >= NOW() - make_interval(months => $2)
    ORDER BY TRIM(order_ref), created_at DESC
"#;

/// Rows are only touched while the purchase-order number is still empty,
/// re-checked at write time so a concurrent manual edit wins.
const ELIGIBLE: &str = r#"
    COALESCE(c.purchase_order_number, '') = ''
    AND (
        COALESCE(s.purchase_order_number, '') <> ''
        OR c.logistics_tracking_number IS DISTINCT FROM s.logistics_tracking_number
    )
"#;

pub struct PgCorrelationStore {
    pool: PgPool,
    channel: String,
    window_months: i32,
}

impl PgCorrelationStore {
    pub fn new(pool: PgPool, channel: impl Into<String>, window_months: i32) -> Self {
        Self {
            pool,
            channel: channel.into(),
            window_months,
        }
    }
}

#[async_trait]
impl CorrelationStore for PgCorrelationStore {
    async fn select_candidates(&self, limit: i64) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(&format!(
            r#"
            SELECT c.order_id
            FROM tracked_cases c
            JOIN ({LATEST_SOURCES}) s ON s.order_ref = TRIM(c.order_id)
            WHERE {ELIGIBLE}
            ORDER BY c.order_id
            LIMIT $3
            "#
        ))
        .bind(&self.channel)
        .bind(self.window_months)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn apply_chunk(&self, order_ids: &[String]) -> Result<u64, sqlx::Error> {
        if order_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(&format!(
            r#"
            UPDATE tracked_cases c SET
                purchase_order_number = NULLIF(s.purchase_order_number, ''),
                logistics_tracking_number = s.logistics_tracking_number
            FROM ({LATEST_SOURCES}) s
            WHERE s.order_ref = TRIM(c.order_id)
              AND c.order_id = ANY($3)
              AND {ELIGIBLE}
            "#
        ))
        .bind(&self.channel)
        .bind(self.window_months)
        .bind(order_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
