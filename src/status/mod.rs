//! Marketplace status vocabulary.

pub mod translate;

pub use translate::{
    NO_DATA, NO_REFUND, UNKNOWN_ORDER_STATUS, translate_order_status, translate_refund_status,
};
