//! Schema introspection against `information_schema.columns`.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;

use opsdesk_core::{Result, SchemaProbe};

use crate::exec;

pub struct PgSchemaProbe {
    pool: PgPool,
}

impl PgSchemaProbe {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaProbe for PgSchemaProbe {
    async fn table_columns(&self, table: &str) -> Result<HashSet<String>> {
        let columns = sqlx::query_scalar::<_, String>(
            r#"
            SELECT column_name
            FROM information_schema.columns
            WHERE table_schema = 'public'
              AND table_name = $1
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| exec::storage_err("probing table columns", e))?;
        Ok(columns.into_iter().collect())
    }
}
