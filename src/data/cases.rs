//! Database operations for `tracked_cases`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use ts_rs::TS;

use crate::data::filters::{CaseFilter, where_clause};
use crate::reconcile::StatusUpdate;
use crate::status::NO_DATA;

const CASE_COLUMNS: &str = "order_id, recipient_name, buyer_account, status_query_url, \
     requested_order_status, requested_refund_status, progress_tracking, \
     purchase_order_number, logistics_tracking_number, follow_up_note, diff_order_detail, \
     follow_up_image_ref, follow_up_by, follow_up_at, created_at";

/// One refund/return case mirrored from the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TrackedCase {
    pub order_id: String,
    pub recipient_name: String,
    pub buyer_account: String,
    pub status_query_url: Option<String>,
    pub requested_order_status: Option<String>,
    pub requested_refund_status: Option<String>,
    pub progress_tracking: Option<String>,
    pub purchase_order_number: Option<String>,
    pub logistics_tracking_number: Option<String>,
    pub follow_up_note: Option<String>,
    pub diff_order_detail: Option<String>,
    pub follow_up_image_ref: Option<String>,
    pub follow_up_by: Option<String>,
    pub follow_up_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TrackedCase {
    /// The status query URL, if present and non-blank.
    pub fn query_url(&self) -> Option<&str> {
        self.status_query_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Fill display defaults for unset fields. Never written back.
    pub fn normalize_for_display(&mut self) {
        fill_blank(&mut self.progress_tracking, ProgressStage::DEFAULT_LABEL);
        fill_blank(&mut self.requested_order_status, NO_DATA);
        fill_blank(&mut self.requested_refund_status, NO_DATA);
    }
}

fn fill_blank(field: &mut Option<String>, default: &str) {
    if field.as_deref().is_none_or(|v| v.trim().is_empty()) {
        *field = Some(default.to_owned());
    }
}

/// Manual follow-up stages, in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    AwaitingMerchantAcceptance,
    MerchantAccepted,
    ReturnInTransit,
    ReturnReceived,
    Refunded,
    Closed,
}

impl ProgressStage {
    pub const ALL: [ProgressStage; 6] = [
        Self::AwaitingMerchantAcceptance,
        Self::MerchantAccepted,
        Self::ReturnInTransit,
        Self::ReturnReceived,
        Self::Refunded,
        Self::Closed,
    ];

    pub const DEFAULT_LABEL: &'static str = "awaiting merchant acceptance";

    pub fn label(self) -> &'static str {
        match self {
            Self::AwaitingMerchantAcceptance => Self::DEFAULT_LABEL,
            Self::MerchantAccepted => "merchant accepted",
            Self::ReturnInTransit => "return in transit",
            Self::ReturnReceived => "return received",
            Self::Refunded => "refunded",
            Self::Closed => "closed",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.label() == label)
    }
}

/// Fields a user may change by hand. Anything else in the request body is
/// dropped during deserialization.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CaseEdit {
    pub follow_up_note: Option<String>,
    pub progress_tracking: Option<String>,
    pub diff_order_detail: Option<String>,
    pub follow_up_image_ref: Option<String>,
    pub purchase_order_number: Option<String>,
    pub logistics_tracking_number: Option<String>,
}

/// Count cases matching `filters`.
pub async fn count_cases(pool: &PgPool, filters: &[CaseFilter]) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM tracked_cases {}", where_clause(filters));
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for filter in filters {
        query = query.bind(filter.bind_value());
    }
    query.fetch_one(pool).await
}

/// Fetch one page of cases, newest first.
pub async fn list_cases(
    pool: &PgPool,
    filters: &[CaseFilter],
    limit: i64,
    offset: i64,
) -> Result<Vec<TrackedCase>, sqlx::Error> {
    let limit_idx = filters.len() + 1;
    let offset_idx = filters.len() + 2;
    let sql = format!(
        "SELECT {CASE_COLUMNS} FROM tracked_cases {} \
         ORDER BY created_at DESC, order_id \
         LIMIT ${limit_idx} OFFSET ${offset_idx}",
        where_clause(filters)
    );

    let mut query = sqlx::query_as::<_, TrackedCase>(&sql);
    for filter in filters {
        query = query.bind(filter.bind_value());
    }
    query.bind(limit).bind(offset).fetch_all(pool).await
}

pub async fn get_case(pool: &PgPool, order_id: &str) -> Result<Option<TrackedCase>, sqlx::Error> {
    sqlx::query_as::<_, TrackedCase>(&format!(
        "SELECT {CASE_COLUMNS} FROM tracked_cases WHERE order_id = $1"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await
}

/// Write refreshed status labels for a page of cases in one transaction.
///
/// Any failing statement rolls back the whole batch.
pub async fn apply_status_updates(
    pool: &PgPool,
    updates: &[StatusUpdate],
) -> Result<u64, sqlx::Error> {
    if updates.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut applied = 0;

    for update in updates {
        let result = sqlx::query(
            r#"
            UPDATE tracked_cases
            SET requested_order_status = $2,
                requested_refund_status = $3
            WHERE order_id = $1
            "#,
        )
        .bind(&update.order_id)
        .bind(&update.order_status)
        .bind(&update.refund_status)
        .execute(&mut *tx)
        .await?;
        applied += result.rows_affected();
    }

    tx.commit().await?;
    Ok(applied)
}

pub async fn set_order_status(pool: &PgPool, order_id: &str, label: &str) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE tracked_cases SET requested_order_status = $2 WHERE order_id = $1")
            .bind(order_id)
            .bind(label)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

pub async fn set_refund_status(
    pool: &PgPool,
    order_id: &str,
    label: &str,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE tracked_cases SET requested_refund_status = $2 WHERE order_id = $1")
            .bind(order_id)
            .bind(label)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

/// Apply a manual edit. Absent fields keep their stored value; the follow-up
/// identity and timestamp are always restamped.
///
/// Returns `false` when no case has `order_id`.
pub async fn update_case(
    pool: &PgPool,
    order_id: &str,
    edit: &CaseEdit,
    follow_up_by: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tracked_cases SET
            follow_up_note = COALESCE($2, follow_up_note),
            progress_tracking = COALESCE($3, progress_tracking),
            diff_order_detail = COALESCE($4, diff_order_detail),
            follow_up_image_ref = COALESCE($5, follow_up_image_ref),
            purchase_order_number = COALESCE($6, purchase_order_number),
            logistics_tracking_number = COALESCE($7, logistics_tracking_number),
            follow_up_by = $8,
            follow_up_at = NOW()
        WHERE order_id = $1
        "#,
    )
    .bind(order_id)
    .bind(&edit.follow_up_note)
    .bind(&edit.progress_tracking)
    .bind(&edit.diff_order_detail)
    .bind(&edit.follow_up_image_ref)
    .bind(&edit.purchase_order_number)
    .bind(&edit.logistics_tracking_number)
    .bind(follow_up_by)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_case(pool: &PgPool, order_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tracked_cases WHERE order_id = $1")
        .bind(order_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_cases(pool: &PgPool, order_ids: &[String]) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tracked_cases WHERE order_id = ANY($1)")
        .bind(order_ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Derive `status_query_url` from `template` for every case lacking one.
/// `{order_id}` in the template is replaced with the trimmed order id.
pub async fn fill_missing_status_urls(pool: &PgPool, template: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tracked_cases
        SET status_query_url = REPLACE($1, '{order_id}', TRIM(order_id))
        WHERE status_query_url IS NULL OR TRIM(status_query_url) = ''
        "#,
    )
    .bind(template)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
