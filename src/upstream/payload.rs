//! Shape of the order-detail response.
//!
//! Only `result.baseInfo` matters; every level is optional because the
//! endpoint omits whole objects for orders it cannot resolve.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    result: Option<PayloadResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PayloadResult {
    #[serde(rename = "baseInfo", default)]
    base_info: Option<BaseInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BaseInfo {
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "refundStatus", default)]
    refund_status: Option<String>,
    #[serde(rename = "refundStatusForAs", default)]
    refund_status_for_as: Option<String>,
}

impl StatusPayload {
    /// Build a payload directly from raw codes.
    pub fn from_codes(status: Option<&str>, refund_status: Option<&str>) -> Self {
        Self {
            result: Some(PayloadResult {
                base_info: Some(BaseInfo {
                    status: status.map(str::to_owned),
                    refund_status: refund_status.map(str::to_owned),
                    refund_status_for_as: None,
                }),
            }),
        }
    }

    fn base_info(&self) -> Option<&BaseInfo> {
        self.result.as_ref()?.base_info.as_ref()
    }

    /// Raw order status code, or `""` when absent.
    pub fn order_status(&self) -> &str {
        self.base_info()
            .and_then(|info| info.status.as_deref())
            .unwrap_or_default()
    }

    /// Raw refund status code, preferring `refundStatus` over the after-sale
    /// `refundStatusForAs`. `""` when both are absent.
    pub fn refund_status(&self) -> &str {
        self.base_info()
            .and_then(|info| {
                info.refund_status
                    .as_deref()
                    .or(info.refund_status_for_as.as_deref())
            })
            .unwrap_or_default()
    }
}
