//! HTTP API over the case service.

pub mod cases;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod status;

pub use routes::*;
