//! Orchestration over the case table, the refresh pipeline, and the backfill job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};
use ts_rs::TS;

use crate::auth::{PermissionGate, PrincipalId};
use crate::cases::CaseError;
use crate::data::cases::{self, CaseEdit, ProgressStage, TrackedCase};
use crate::data::filters::CaseFilter;
use crate::reconcile::RefreshPipeline;
use crate::status::{translate_order_status, translate_refund_status};
use crate::sync::BackfillJob;
use crate::upstream::{StatusPayload, StatusSource};
use crate::utils::warn_if_slow;

const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
const SLOW_PAGE_REFRESH: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct CaseServiceSettings {
    /// Per-fetch timeout for the single-record refresh actions.
    pub refresh_timeout: Duration,
    /// Template with `{order_id}` used by auto-match.
    pub status_url_template: Option<String>,
}

impl Default for CaseServiceSettings {
    fn default() -> Self {
        Self {
            refresh_timeout: Duration::from_secs(10),
            status_url_template: None,
        }
    }
}

/// Parsed list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub filters: Vec<CaseFilter>,
    pub page: i64,
    pub page_size: i64,
}

impl ListRequest {
    /// Build from raw query parameters. `page` and `pageSize` are clamped;
    /// every other recognised parameter becomes a filter.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let number = |key: &str| params.get(key).and_then(|v| v.trim().parse::<i64>().ok());
        Self {
            filters: CaseFilter::from_params(
                params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            ),
            page: number("page").unwrap_or(1).max(1),
            page_size: number("pageSize")
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CaseListResponse {
    pub data: Vec<TrackedCase>,
    #[ts(type = "number")]
    pub total: i64,
    pub can_edit: bool,
    /// Set when refreshed statuses could not be saved; `data` then shows the
    /// previously stored values.
    pub refresh_failed: bool,
}

pub struct CaseService {
    pool: PgPool,
    pipeline: RefreshPipeline,
    source: Arc<dyn StatusSource>,
    gate: PermissionGate,
    backfill: Arc<BackfillJob>,
    settings: CaseServiceSettings,
}

impl CaseService {
    pub fn new(
        pool: PgPool,
        pipeline: RefreshPipeline,
        source: Arc<dyn StatusSource>,
        gate: PermissionGate,
        backfill: Arc<BackfillJob>,
        settings: CaseServiceSettings,
    ) -> Self {
        Self {
            pool,
            pipeline,
            source,
            gate,
            backfill,
            settings,
        }
    }

    async fn require_mutation(&self, principal: Option<PrincipalId>) -> Result<PrincipalId, CaseError> {
        let Some(id) = principal else {
            return Err(CaseError::PermissionDenied);
        };
        if !self.gate.can_mutate(Some(id)).await {
            return Err(CaseError::PermissionDenied);
        }
        Ok(id)
    }

    /// List a page of cases, refreshing their statuses from upstream first.
    ///
    /// Upstream failures never fail the read. A failure to persist refreshed
    /// statuses is reported through `refresh_failed`.
    #[instrument(skip_all, fields(page = request.page, page_size = request.page_size))]
    pub async fn list(
        &self,
        request: &ListRequest,
        principal: Option<PrincipalId>,
    ) -> Result<CaseListResponse, CaseError> {
        let total = cases::count_cases(&self.pool, &request.filters).await?;
        let mut rows = cases::list_cases(
            &self.pool,
            &request.filters,
            request.page_size,
            request.offset(),
        )
        .await?;

        let refresh_started = Instant::now();
        let refresh_failed = match self.pipeline.refresh_page(&self.pool, &mut rows).await {
            Ok(report) => {
                debug!(
                    refreshed = report.updates.len(),
                    skipped = report.skipped.len(),
                    "Page statuses refreshed"
                );
                false
            }
            Err(e) => {
                error!(error = ?e, "Failed to persist refreshed statuses");
                true
            }
        };

        warn_if_slow(refresh_started, SLOW_PAGE_REFRESH, "page status refresh");

        for row in &mut rows {
            row.normalize_for_display();
        }

        Ok(CaseListResponse {
            data: rows,
            total,
            can_edit: self.gate.can_mutate(principal).await,
            refresh_failed,
        })
    }

    async fn fetch_single(&self, order_id: &str) -> Result<StatusPayload, CaseError> {
        let case = cases::get_case(&self.pool, order_id)
            .await?
            .ok_or_else(|| CaseError::NotFound(order_id.to_owned()))?;
        let url = case
            .query_url()
            .ok_or_else(|| CaseError::MissingStatusUrl(order_id.to_owned()))?;

        self.source
            .fetch(url, self.settings.refresh_timeout)
            .await
            .map_err(|e| {
                warn!(order_id, url, error = %e, "Single-record status fetch failed");
                CaseError::Fetch(e)
            })
    }

    /// Fetch, translate and store the order status of one case.
    #[instrument(skip(self))]
    pub async fn refresh_order_status(&self, order_id: &str) -> Result<String, CaseError> {
        let payload = self.fetch_single(order_id).await?;
        let label = translate_order_status(payload.order_status());
        cases::set_order_status(&self.pool, order_id, label).await?;
        info!(order_id, status = label, "Order status refreshed");
        Ok(label.to_owned())
    }

    /// Fetch, translate and store the refund status of one case.
    #[instrument(skip(self))]
    pub async fn refresh_refund_status(&self, order_id: &str) -> Result<String, CaseError> {
        let payload = self.fetch_single(order_id).await?;
        let label = translate_refund_status(payload.refund_status());
        cases::set_refund_status(&self.pool, order_id, label).await?;
        info!(order_id, refund_status = label, "Refund status refreshed");
        Ok(label.to_owned())
    }

    /// Apply a manual edit on behalf of `principal`.
    #[instrument(skip(self, edit))]
    pub async fn update(
        &self,
        order_id: &str,
        edit: &CaseEdit,
        principal: Option<PrincipalId>,
    ) -> Result<(), CaseError> {
        let order_id = non_blank(order_id)?;
        if let Some(stage) = edit.progress_tracking.as_deref()
            && ProgressStage::from_label(stage).is_none()
        {
            return Err(CaseError::Validation(format!(
                "unknown progress stage '{stage}'"
            )));
        }

        let principal = self.require_mutation(principal).await?;
        let follow_up_by = self.gate.display_name(principal).await;

        if !cases::update_case(&self.pool, order_id, edit, &follow_up_by).await? {
            return Err(CaseError::NotFound(order_id.to_owned()));
        }
        info!(order_id, follow_up_by = %follow_up_by, "Case updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, order_id: &str, principal: Option<PrincipalId>) -> Result<(), CaseError> {
        let order_id = non_blank(order_id)?;
        self.require_mutation(principal).await?;

        if cases::delete_case(&self.pool, order_id).await? == 0 {
            return Err(CaseError::NotFound(order_id.to_owned()));
        }
        info!(order_id, "Case deleted");
        Ok(())
    }

    /// Delete several cases at once. Returns how many rows were removed.
    #[instrument(skip(self, order_ids), fields(requested = order_ids.len()))]
    pub async fn batch_delete(
        &self,
        order_ids: &[String],
        principal: Option<PrincipalId>,
    ) -> Result<u64, CaseError> {
        let ids: Vec<String> = order_ids
            .iter()
            .filter(|id| !id.trim().is_empty())
            .cloned()
            .collect();
        if ids.is_empty() {
            return Err(CaseError::Validation("orderIds must not be empty".into()));
        }
        self.require_mutation(principal).await?;

        let deleted = cases::delete_cases(&self.pool, &ids).await?;
        info!(deleted, "Cases batch deleted");
        Ok(deleted)
    }

    /// Run the correlation backfill now. Returns the number of rows updated.
    #[instrument(skip(self))]
    pub async fn sync_data(&self, principal: Option<PrincipalId>) -> Result<u64, CaseError> {
        self.require_mutation(principal).await?;
        let report = self.backfill.run().await?;
        Ok(report.updated)
    }

    /// Derive missing status query URLs from the configured template.
    #[instrument(skip(self))]
    pub async fn auto_match(&self, principal: Option<PrincipalId>) -> Result<u64, CaseError> {
        self.require_mutation(principal).await?;
        let template = self
            .settings
            .status_url_template
            .as_deref()
            .ok_or(CaseError::NotConfigured("STATUS_URL_TEMPLATE"))?;

        let matched = cases::fill_missing_status_urls(&self.pool, template).await?;
        info!(matched, "Filled missing status query urls");
        Ok(matched)
    }
}

/// Rejects blank IDs. Stored IDs may carry whitespace, so the value is
/// returned exactly as sent.
fn non_blank(order_id: &str) -> Result<&str, CaseError> {
    if order_id.trim().is_empty() {
        return Err(CaseError::Validation("orderId is required".into()));
    }
    Ok(order_id)
}
