//! Role administration: the module that writes what the gate reads.
//!
//! These tables have a fixed shape (they are created by the roles module
//! itself, not per-deployment), so nothing here goes through the adaptive
//! builders. Role deletion is the one multi-statement transaction in the
//! system: grants, assignments and the role row go together or not at all.

use sqlx::PgPool;

use opsdesk_core::{GrantFlags, OpsError, Result};

use crate::exec;

#[derive(Debug, Clone)]
pub struct RoleRecord {
    pub id: i64,
    pub name: String,
    pub active: bool,
    /// (resource, flags) pairs of the role's active grants.
    pub grants: Vec<(String, GrantFlags)>,
}

#[derive(Debug, Clone)]
pub struct RoleGrantInput {
    pub resource: String,
    pub flags: GrantFlags,
}

pub struct RolesAdminService {
    pool: PgPool,
}

impl RolesAdminService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<RoleRecord>> {
        let roles = sqlx::query_as::<_, (i64, String, bool)>(
            "SELECT id, name, active FROM roles ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| exec::storage_err("listing roles", e))?;

        let grant_rows = sqlx::query_as::<_, (i64, String, bool, bool, bool, bool, bool, bool, bool)>(
            r#"
            SELECT role_id, resource, can_create, can_view_all, can_view_own,
                   can_edit_all, can_edit_own, can_delete, can_export
            FROM role_permissions
            WHERE active
            ORDER BY resource
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| exec::storage_err("listing role grants", e))?;

        let mut records: Vec<RoleRecord> = roles
            .into_iter()
            .map(|(id, name, active)| RoleRecord {
                id,
                name,
                active,
                grants: Vec::new(),
            })
            .collect();
        for (role_id, resource, cc, cva, cvo, cea, ceo, cd, cx) in grant_rows {
            if let Some(record) = records.iter_mut().find(|r| r.id == role_id) {
                record.grants.push((
                    resource,
                    GrantFlags {
                        can_create: cc,
                        can_view_all: cva,
                        can_view_own: cvo,
                        can_edit_all: cea,
                        can_edit_own: ceo,
                        can_delete: cd,
                        can_export: cx,
                    },
                ));
            }
        }
        Ok(records)
    }

    pub async fn create(&self, name: &str, grants: &[RoleGrantInput]) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OpsError::validation("Role name is required."));
        }
        let role_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO roles (name, active) VALUES ($1, true) RETURNING id",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| exec::storage_err("creating role", e))?;

        for grant in grants {
            sqlx::query(
                r#"
                INSERT INTO role_permissions
                    (role_id, resource, can_create, can_view_all, can_view_own,
                     can_edit_all, can_edit_own, can_delete, can_export, active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, true)
                "#,
            )
            .bind(role_id)
            .bind(&grant.resource)
            .bind(grant.flags.can_create)
            .bind(grant.flags.can_view_all)
            .bind(grant.flags.can_view_own)
            .bind(grant.flags.can_edit_all)
            .bind(grant.flags.can_edit_own)
            .bind(grant.flags.can_delete)
            .bind(grant.flags.can_export)
            .execute(&self.pool)
            .await
            .map_err(|e| exec::storage_err("storing role grant", e))?;
        }
        Ok(role_id)
    }

    /// Idempotent: assigning a role the user already holds is a no-op.
    pub async fn assign(&self, role_id: i64, user_id: i64) -> Result<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM roles WHERE id = $1)",
        )
        .bind(role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| exec::storage_err("checking role", e))?;
        if !exists {
            return Err(OpsError::NotFound("Role".to_string()));
        }
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| exec::storage_err("assigning role", e))?;
        Ok(())
    }

    /// Delete a role and everything hanging off it, atomically. Any step
    /// failing rolls back all three tables.
    pub async fn delete(&self, role_id: i64) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| exec::storage_err("starting role delete", e))?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| exec::storage_err("deleting role grants", e))?;

        sqlx::query("DELETE FROM user_roles WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| exec::storage_err("deleting role assignments", e))?;

        let affected = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| exec::storage_err("deleting role", e))?
            .rows_affected();
        if affected == 0 {
            // Dropping the transaction rolls back the first two deletes.
            return Err(OpsError::NotFound("Role".to_string()));
        }

        tx.commit()
            .await
            .map_err(|e| exec::storage_err("committing role delete", e))?;
        Ok(())
    }
}
