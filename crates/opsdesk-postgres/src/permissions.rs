//! Role-based grant lookups.
//!
//! A grant row only counts when both its role and its permission row are
//! active, so deactivating a role revokes everything it carried without
//! deleting history.

use async_trait::async_trait;
use sqlx::PgPool;

use opsdesk_core::{GrantFlags, PermissionStore, Result};

use crate::exec;

pub struct PgPermissionStore {
    pool: PgPool,
}

impl PgPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn installed(&self) -> Result<bool> {
        let missing = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM (VALUES ('roles'), ('user_roles'), ('role_permissions')) AS required(name)
            WHERE to_regclass('public.' || required.name) IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| exec::storage_err("checking permission tables", e))?;
        Ok(missing == 0)
    }

    async fn grants_for(&self, actor_id: i64, resource: &str) -> Result<Vec<GrantFlags>> {
        let rows = sqlx::query_as::<_, (bool, bool, bool, bool, bool, bool, bool)>(
            r#"
            SELECT p.can_create, p.can_view_all, p.can_view_own,
                   p.can_edit_all, p.can_edit_own, p.can_delete, p.can_export
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id AND r.active
            JOIN role_permissions p ON p.role_id = r.id AND p.active
            WHERE ur.user_id = $1
              AND p.resource = $2
            "#,
        )
        .bind(actor_id)
        .bind(resource)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| exec::storage_err("loading grants", e))?;

        Ok(rows
            .into_iter()
            .map(
                |(can_create, can_view_all, can_view_own, can_edit_all, can_edit_own, can_delete, can_export)| {
                    GrantFlags {
                        can_create,
                        can_view_all,
                        can_view_own,
                        can_edit_all,
                        can_edit_own,
                        can_delete,
                        can_export,
                    }
                },
            )
            .collect())
    }
}
