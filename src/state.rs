//! State shared by every request handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cases::CaseService;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub cases: Arc<CaseService>,
}

impl AppState {
    pub fn new(db_pool: PgPool, cases: Arc<CaseService>) -> Self {
        Self { db_pool, cases }
    }
}
