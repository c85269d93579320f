//! DB-backed sessions and the one-shot flash message.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use opsdesk_core::{Result, SessionRecord, SessionStore};

use crate::exec;

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, (String, i64, String, Option<String>, DateTime<Utc>)>(
            r#"
            SELECT token, user_id, display_name, flash, expires_at
            FROM sessions
            WHERE token = $1
              AND expires_at > now()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| exec::storage_err("resolving session", e))?;

        Ok(row.map(
            |(token, user_id, display_name, flash, expires_at)| SessionRecord {
                token,
                user_id,
                display_name,
                flash,
                expires_at,
            },
        ))
    }

    async fn set_flash(&self, token: &str, message: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET flash = $2 WHERE token = $1")
            .bind(token)
            .bind(message)
            .execute(&self.pool)
            .await
            .map_err(|e| exec::storage_err("storing flash message", e))?;
        Ok(())
    }

    async fn take_flash(&self, token: &str) -> Result<Option<String>> {
        // The self-join sees the pre-update snapshot, so `old.flash` is the
        // value being cleared. One statement, no transaction.
        let flash = sqlx::query_scalar::<_, Option<String>>(
            r#"
            UPDATE sessions s
            SET flash = NULL
            FROM (SELECT token, flash FROM sessions WHERE token = $1) old
            WHERE s.token = old.token
            RETURNING old.flash
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| exec::storage_err("clearing flash message", e))?;
        Ok(flash.flatten())
    }
}
