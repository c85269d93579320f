//! Shared sqlx plumbing: kind-tagged parameter binds and error wrapping.
//!
//! Every statement the services assemble arrives here as SQL text plus a
//! `Vec<FieldValue>`. NULLs are bound with the wire type their kind tag
//! names; an untyped NULL would reach the server with a text parameter OID
//! and fail to prepare against date or numeric columns.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use opsdesk_core::{FieldKind, FieldValue, OpsError, Result, SqlStatement};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

fn bind_field(query: PgQuery<'_>, value: FieldValue) -> PgQuery<'_> {
    match value {
        FieldValue::Int(v) => query.bind(v),
        FieldValue::Float(v) => query.bind(v),
        FieldValue::Decimal(v) => query.bind(v),
        FieldValue::Text(v) => query.bind(v),
        FieldValue::Bool(v) => query.bind(v),
        FieldValue::Date(v) => query.bind(v),
        FieldValue::Timestamp(v) => query.bind(v),
        FieldValue::Null(kind) => match kind {
            FieldKind::Int => query.bind(Option::<i64>::None),
            FieldKind::Float => query.bind(Option::<f64>::None),
            FieldKind::Decimal => query.bind(Option::<Decimal>::None),
            FieldKind::Text => query.bind(Option::<String>::None),
            FieldKind::Bool => query.bind(Option::<bool>::None),
            FieldKind::Date => query.bind(Option::<NaiveDate>::None),
            FieldKind::Timestamp => query.bind(Option::<DateTime<Utc>>::None),
        },
    }
}

fn bind_all(sql: &str, bindings: Vec<FieldValue>) -> PgQuery<'_> {
    let mut query = sqlx::query(sql);
    for value in bindings {
        query = bind_field(query, value);
    }
    query
}

/// Wrap a driver error, keeping the engine text for operator diagnosis
/// while the user sees only the safe message.
pub(crate) fn storage_err(context: &str, err: sqlx::Error) -> OpsError {
    OpsError::storage(
        "The request could not be completed.",
        Some(format!("{context}: {err}")),
    )
}

pub(crate) async fn fetch_all(
    pool: &PgPool,
    sql: &str,
    bindings: Vec<FieldValue>,
    context: &str,
) -> Result<Vec<PgRow>> {
    bind_all(sql, bindings)
        .fetch_all(pool)
        .await
        .map_err(|e| storage_err(context, e))
}

pub(crate) async fn fetch_optional(
    pool: &PgPool,
    sql: &str,
    bindings: Vec<FieldValue>,
    context: &str,
) -> Result<Option<PgRow>> {
    bind_all(sql, bindings)
        .fetch_optional(pool)
        .await
        .map_err(|e| storage_err(context, e))
}

/// Typed column read from a fetched row.
pub(crate) fn col<'r, T>(row: &'r PgRow, name: &str, context: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| storage_err(context, e))
}

/// Run a statement and report how many rows it touched.
pub(crate) async fn execute(
    pool: &PgPool,
    sql: &str,
    bindings: Vec<FieldValue>,
    context: &str,
) -> Result<u64> {
    let result = bind_all(sql, bindings)
        .execute(pool)
        .await
        .map_err(|e| storage_err(context, e))?;
    Ok(result.rows_affected())
}

/// Run an INSERT carrying `RETURNING id` and hand back the new key.
pub(crate) async fn insert_returning_id(
    pool: &PgPool,
    stmt: SqlStatement,
    context: &str,
) -> Result<i64> {
    let SqlStatement { sql, bindings } = stmt;
    let row = bind_all(&sql, bindings)
        .fetch_one(pool)
        .await
        .map_err(|e| storage_err(context, e))?;
    row.try_get::<i64, _>(0).map_err(|e| storage_err(context, e))
}

/// Run a prebuilt UPDATE and map "no row touched" to NotFound.
pub(crate) async fn execute_required(
    pool: &PgPool,
    stmt: SqlStatement,
    what: &str,
    context: &str,
) -> Result<()> {
    let SqlStatement { sql, bindings } = stmt;
    let affected = execute(pool, &sql, bindings, context).await?;
    if affected == 0 {
        return Err(OpsError::NotFound(what.to_string()));
    }
    Ok(())
}
