//! INSERT/UPDATE text construction restricted to columns that exist.
//!
//! The central rule of the whole layer lives here: a statement never
//! references a column absent from the schema registry. Fields whose column
//! is missing are dropped silently; a mutation in which *no* field survives
//! is refused instead of emitting invalid SQL.

use thiserror::Error;

use crate::error::OpsError;
use crate::field::{FieldValue, RecordFields};
use crate::schema::SchemaRegistry;

#[derive(Debug, Error, PartialEq)]
pub enum MutationError {
    #[error("no applicable columns on {table}: none of [{requested}] exist in this deployment")]
    NoApplicableColumns { table: String, requested: String },
}

impl From<MutationError> for OpsError {
    fn from(err: MutationError) -> Self {
        OpsError::storage("The record could not be saved.", Some(err.to_string()))
    }
}

/// SQL text plus the kind-tagged bindings in placeholder order.
#[derive(Debug, Clone)]
pub struct SqlStatement {
    pub sql: String,
    pub bindings: Vec<FieldValue>,
}

fn partition_existing(
    table: &str,
    fields: RecordFields,
    registry: &SchemaRegistry,
) -> Result<Vec<(String, FieldValue)>, MutationError> {
    let all: Vec<(String, FieldValue)> = fields.into_parts();
    let requested: Vec<String> = all.iter().map(|(c, _)| c.clone()).collect();
    let surviving: Vec<(String, FieldValue)> = all
        .into_iter()
        .filter(|(column, _)| registry.has_column(table, column))
        .collect();
    if surviving.is_empty() {
        return Err(MutationError::NoApplicableColumns {
            table: table.to_string(),
            requested: requested.join(", "),
        });
    }
    Ok(surviving)
}

/// Build `INSERT INTO table (…) VALUES ($1…$n) [RETURNING col]`.
pub fn build_insert(
    table: &str,
    fields: RecordFields,
    registry: &SchemaRegistry,
    returning: Option<&str>,
) -> Result<SqlStatement, MutationError> {
    let surviving = partition_existing(table, fields, registry)?;

    let columns: Vec<&str> = surviving.iter().map(|(c, _)| c.as_str()).collect();
    let placeholders: Vec<String> = (1..=surviving.len()).map(|i| format!("${i}")).collect();

    let mut sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    if let Some(col) = returning {
        sql.push_str(&format!(" RETURNING {col}"));
    }

    Ok(SqlStatement {
        sql,
        bindings: surviving.into_iter().map(|(_, v)| v).collect(),
    })
}

/// Build `UPDATE table SET col = $i, … WHERE id_column = $n`.
///
/// The identifier predicate is always appended and binds last.
pub fn build_update(
    table: &str,
    fields: RecordFields,
    registry: &SchemaRegistry,
    id_column: &str,
    id: impl Into<FieldValue>,
) -> Result<SqlStatement, MutationError> {
    let surviving = partition_existing(table, fields, registry)?;

    let assignments: Vec<String> = surviving
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = ${}", i + 1))
        .collect();
    let id_placeholder = surviving.len() + 1;

    let sql = format!(
        "UPDATE {table} SET {} WHERE {id_column} = ${id_placeholder}",
        assignments.join(", ")
    );

    let mut bindings: Vec<FieldValue> = surviving.into_iter().map(|(_, v)| v).collect();
    bindings.push(id.into());

    Ok(SqlStatement { sql, bindings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::default().with_table(
            "calls",
            &[
                "id",
                "title",
                "call_date",
                "outcome",
                "assigned_to",
                "created_by",
                "created_at",
            ],
        )
    }

    fn call_fields() -> RecordFields {
        RecordFields::new()
            .set("title", "Intro")
            .set("call_date", NaiveDate::from_ymd_opt(2026, 8, 22).unwrap())
            .set("outcome", "Interested")
            .set("assigned_to", 7i64)
            .set("follow_up_date", NaiveDate::from_ymd_opt(2026, 9, 1).unwrap())
            .set("follow_up_type", "Call")
    }

    #[test]
    fn insert_omits_missing_columns_and_keeps_present_ones() {
        let stmt = build_insert("calls", call_fields(), &registry(), Some("id")).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO calls (title, call_date, outcome, assigned_to) \
             VALUES ($1, $2, $3, $4) RETURNING id"
        );
        assert!(!stmt.sql.contains("follow_up_date"));
        assert!(!stmt.sql.contains("follow_up_type"));
        assert_eq!(stmt.bindings.len(), 4);
        assert_eq!(stmt.bindings[0], FieldValue::Text("Intro".into()));
    }

    #[test]
    fn insert_without_returning_clause() {
        let fields = RecordFields::new().set("title", "x");
        let stmt = build_insert("calls", fields, &registry(), None).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO calls (title) VALUES ($1)");
    }

    #[test]
    fn update_appends_identifier_predicate_last() {
        let fields = RecordFields::new()
            .set("title", "Renamed")
            .set("ghost_column", "dropped")
            .set("outcome", "No Answer");
        let stmt = build_update("calls", fields, &registry(), "id", 42i64).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE calls SET title = $1, outcome = $2 WHERE id = $3"
        );
        assert_eq!(stmt.bindings.len(), 3);
        assert_eq!(stmt.bindings[2], FieldValue::Int(42));
    }

    #[test]
    fn empty_mutation_is_refused() {
        let fields = RecordFields::new()
            .set("ghost_a", 1i64)
            .set("ghost_b", "x");
        let err = build_insert("calls", fields.clone(), &registry(), None).unwrap_err();
        assert!(matches!(err, MutationError::NoApplicableColumns { .. }));
        assert!(err.to_string().contains("ghost_a, ghost_b"));

        let err = build_update("calls", fields, &registry(), "id", 1i64).unwrap_err();
        assert!(matches!(err, MutationError::NoApplicableColumns { .. }));
    }

    #[test]
    fn unknown_table_refuses_everything() {
        let fields = RecordFields::new().set("title", "x");
        let err = build_insert("unknown", fields, &registry(), None).unwrap_err();
        assert!(matches!(err, MutationError::NoApplicableColumns { .. }));
    }

    #[test]
    fn null_values_bind_as_null_without_dropping_the_column() {
        let fields = RecordFields::new()
            .set("title", "x")
            .set("outcome", None::<String>);
        let stmt = build_insert("calls", fields, &registry(), None).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO calls (title, outcome) VALUES ($1, $2)");
        assert!(stmt.bindings[1].is_null());
    }

    #[test]
    fn mutation_error_converts_to_storage_failed() {
        let err = MutationError::NoApplicableColumns {
            table: "calls".into(),
            requested: "ghost".into(),
        };
        let ops: OpsError = err.into();
        assert_eq!(ops.http_status(), 500);
        assert!(ops.diagnostic().unwrap().contains("ghost"));
    }
}
