//! Mapping from client-facing search parameters onto stored columns.
//!
//! The `state` parameter is labelled "order status" in the UI but has always
//! filtered `requested_refund_status`. Clients depend on that behaviour, so the
//! mapping is kept here as data rather than reinterpreted.

use crate::data::cases::ProgressStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Case-sensitive equality.
    Exact,
    /// Case-insensitive substring (`ILIKE`).
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterColumn {
    /// Query parameter name as sent by clients.
    pub param: &'static str,
    /// Column in `tracked_cases`.
    pub column: &'static str,
    pub kind: MatchKind,
    /// Value a NULL or empty column is treated as when matching.
    pub null_as: Option<&'static str>,
}

pub static FILTER_COLUMNS: &[FilterColumn] = &[
    FilterColumn {
        param: "orderId",
        column: "order_id",
        kind: MatchKind::Contains,
        null_as: None,
    },
    FilterColumn {
        param: "recipientName",
        column: "recipient_name",
        kind: MatchKind::Contains,
        null_as: None,
    },
    FilterColumn {
        param: "buyerAccount",
        column: "buyer_account",
        kind: MatchKind::Contains,
        null_as: None,
    },
    FilterColumn {
        param: "state",
        column: "requested_refund_status",
        kind: MatchKind::Exact,
        null_as: None,
    },
    FilterColumn {
        param: "refundStatus",
        column: "requested_refund_status",
        kind: MatchKind::Exact,
        null_as: None,
    },
    FilterColumn {
        param: "progressTracking",
        column: "progress_tracking",
        kind: MatchKind::Exact,
        null_as: Some(ProgressStage::DEFAULT_LABEL),
    },
    FilterColumn {
        param: "purchaseOrderNumber",
        column: "purchase_order_number",
        kind: MatchKind::Contains,
        null_as: None,
    },
    FilterColumn {
        param: "logisticsTrackingNumber",
        column: "logistics_tracking_number",
        kind: MatchKind::Contains,
        null_as: None,
    },
];

/// A resolved search condition ready to be rendered into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFilter {
    pub column: &'static FilterColumn,
    pub value: String,
}

impl FilterColumn {
    pub fn lookup(param: &str) -> Option<&'static FilterColumn> {
        FILTER_COLUMNS.iter().find(|c| c.param == param)
    }
}

impl CaseFilter {
    /// Resolve query parameters into filters.
    ///
    /// Unknown parameters and blank values are ignored. The result follows
    /// [`FILTER_COLUMNS`] order so the generated SQL is stable.
    pub fn from_params<'a, I>(params: I) -> Vec<CaseFilter>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filters: Vec<CaseFilter> = params
            .into_iter()
            .filter_map(|(param, value)| {
                let value = value.trim();
                if value.is_empty() {
                    return None;
                }
                FilterColumn::lookup(param).map(|column| CaseFilter {
                    column,
                    value: value.to_owned(),
                })
            })
            .collect();
        filters.sort_by_key(|f| {
            FILTER_COLUMNS
                .iter()
                .position(|c| c.param == f.column.param)
                .unwrap_or(usize::MAX)
        });
        filters
    }

    /// SQL condition using placeholder `$index`.
    pub fn condition(&self, index: usize) -> String {
        let column = match self.column.null_as {
            Some(default) => format!(
                "COALESCE(NULLIF({}, ''), '{}')",
                self.column.column,
                default.replace('\'', "''")
            ),
            None => self.column.column.to_string(),
        };
        match self.column.kind {
            MatchKind::Exact => format!("{column} = ${index}"),
            MatchKind::Contains => format!("{column} ILIKE '%' || ${index} || '%'"),
        }
    }

    /// Value to bind for [`condition`](Self::condition).
    pub fn bind_value(&self) -> String {
        match self.column.kind {
            MatchKind::Exact => self.value.clone(),
            MatchKind::Contains => escape_like(&self.value),
        }
    }
}

/// Render `WHERE ...` (or an empty string) for `filters`, numbering
/// placeholders from `$1`.
pub fn where_clause(filters: &[CaseFilter]) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let conditions: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(i, f)| f.condition(i + 1))
        .collect();
    format!("WHERE {}", conditions.join(" AND "))
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
