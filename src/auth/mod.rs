//! Role-based permission gate for mutating operations.
//!
//! Authentication happens upstream of this service; requests arrive with a
//! principal id (or none). Roles and display names are read from the account
//! system's tables through [`RoleDirectory`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{trace, warn};

pub type PrincipalId = i64;

/// Read access to the principal directory.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn role_ids(&self, principal: PrincipalId) -> Result<Vec<i64>, sqlx::Error>;

    async fn display_name(&self, principal: PrincipalId) -> Result<Option<String>, sqlx::Error>;
}

pub struct PgRoleDirectory {
    pool: PgPool,
}

impl PgRoleDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleDirectory for PgRoleDirectory {
    async fn role_ids(&self, principal: PrincipalId) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT role_id FROM principal_roles WHERE principal_id = $1")
            .bind(principal)
            .fetch_all(&self.pool)
            .await
    }

    async fn display_name(&self, principal: PrincipalId) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT display_name FROM principals WHERE id = $1")
            .bind(principal)
            .fetch_optional(&self.pool)
            .await
    }
}

/// Allows a mutation when the principal holds at least one allow-listed role.
pub struct PermissionGate {
    directory: Arc<dyn RoleDirectory>,
    allowed_roles: HashSet<i64>,
}

impl PermissionGate {
    pub fn new(directory: Arc<dyn RoleDirectory>, allowed_roles: impl IntoIterator<Item = i64>) -> Self {
        Self {
            directory,
            allowed_roles: allowed_roles.into_iter().collect(),
        }
    }

    /// Whether `principal` may edit or delete cases. Anonymous callers, unknown
    /// principals and directory errors all yield `false`.
    pub async fn can_mutate(&self, principal: Option<PrincipalId>) -> bool {
        let Some(principal) = principal else {
            return false;
        };

        match self.directory.role_ids(principal).await {
            Ok(roles) => {
                let allowed = roles.iter().any(|r| self.allowed_roles.contains(r));
                trace!(principal, ?roles, allowed, "Checked mutation permission");
                allowed
            }
            Err(e) => {
                warn!(principal, error = ?e, "Role lookup failed, denying mutation");
                false
            }
        }
    }

    /// Name recorded as `follow_up_by`. Falls back to the numeric id when the
    /// directory has no name or cannot be reached.
    pub async fn display_name(&self, principal: PrincipalId) -> String {
        match self.directory.display_name(principal).await {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => principal.to_string(),
            Err(e) => {
                warn!(principal, error = ?e, "Display name lookup failed");
                principal.to_string()
            }
        }
    }
}
