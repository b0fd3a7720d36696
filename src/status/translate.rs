//! Display labels for upstream order and refund status codes.
//!
//! Order codes are matched case-insensitively. Refund codes are matched
//! exactly: the upstream sends `refundStatus` in SCREAMING_SNAKE and the
//! after-sale `refundStatusForAs` in lowercase, and both spellings are listed.

/// Label for an order code that is empty or not in [`ORDER_STATUS_LABELS`].
pub const UNKNOWN_ORDER_STATUS: &str = "unknown status";

/// Label for a refund code that is empty or not in [`REFUND_STATUS_LABELS`].
pub const NO_REFUND: &str = "no refund";

/// Rendered in place of a status column that has never been fetched.
pub const NO_DATA: &str = "no data";

/// Keys are lowercase.
static ORDER_STATUS_LABELS: &[(&str, &str)] = &[
    ("waitbuyerpay", "awaiting buyer payment"),
    ("waitsellersend", "awaiting seller shipment"),
    ("waitlogisticstakein", "awaiting carrier pickup"),
    ("waitbuyerreceive", "awaiting buyer receipt"),
    ("waitbuyersign", "awaiting buyer signature"),
    ("signinsuccess", "signed by buyer"),
    ("confirm_goods", "goods confirmed"),
    ("success", "completed"),
    ("cancel", "cancelled"),
    ("terminated", "terminated"),
];

static REFUND_STATUS_LABELS: &[(&str, &str)] = &[
    ("WAIT_SELLER_AGREE", "awaiting seller approval"),
    ("WAIT_BUYER_MODIFY", "awaiting buyer revision"),
    ("WAIT_BUYER_SEND", "awaiting buyer return shipment"),
    ("WAIT_SELLER_RECEIVE", "awaiting seller receipt"),
    ("REFUND_SUCCESS", "refund succeeded"),
    ("REFUND_CLOSED", "refund closed"),
    ("waitselleragree", "awaiting seller approval"),
    ("waitbuyermodify", "awaiting buyer revision"),
    ("waitbuyersend", "awaiting buyer return shipment"),
    ("waitsellerreceive", "awaiting seller receipt"),
    ("refundsuccess", "refund succeeded"),
    ("refundclose", "refund closed"),
];

fn lookup(table: &'static [(&'static str, &'static str)], code: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, label)| *label)
}

/// Translate an upstream order status code into its display label.
pub fn translate_order_status(code: &str) -> &'static str {
    let code = code.trim().to_lowercase();
    lookup(ORDER_STATUS_LABELS, &code).unwrap_or(UNKNOWN_ORDER_STATUS)
}

/// Translate an upstream refund status code into its display label.
pub fn translate_refund_status(code: &str) -> &'static str {
    lookup(REFUND_STATUS_LABELS, code.trim()).unwrap_or(NO_REFUND)
}
