//! Case listing, refresh, and mutation operations.

pub mod errors;
pub mod service;

pub use errors::CaseError;
pub use service::{CaseListResponse, CaseService, CaseServiceSettings, ListRequest, MAX_PAGE_SIZE};
