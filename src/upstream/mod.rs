//! Client for the marketplace order-detail endpoint.
//!
//! Every tracked case carries a precomputed query URL; the client issues one
//! GET per case and hands back the raw payload. It never retries.

pub mod client;
pub mod errors;
pub mod json;
pub mod payload;

pub use client::{StatusClient, StatusSource};
pub use errors::FetchError;
pub use payload::StatusPayload;
