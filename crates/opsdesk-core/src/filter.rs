//! WHERE-clause assembly for list pages.
//!
//! Filters are adaptive the same way projections are: a condition is added
//! only when its column exists in the [`SchemaRegistry`](crate::SchemaRegistry),
//! and a filter on an absent column disappears silently. The page then shows
//! the unfiltered (but still scoped) list instead of erroring, which is the
//! behaviour installations without the optional columns expect.
//!
//! Row scope is different. [`ListQuery::assemble`] takes the scope as a
//! required argument, so there is no way to produce a WHERE clause without
//! deciding visibility. Pages never append their own owner checks.

use chrono::NaiveDate;

use crate::field::FieldValue;
use crate::gate::RowScope;
use crate::schema::SchemaRegistry;

/// Columns the scope predicate binds the actor against.
#[derive(Debug, Clone, Copy)]
pub struct ScopeColumns {
    /// Creator column. Part of every module's contract, never probed.
    pub owner: &'static str,
    /// Assignment column, when the module has one. Probed before use.
    pub assignee: Option<&'static str>,
}

/// Finished clause plus its bindings, in placeholder order.
///
/// `sql` is either empty or starts with `" WHERE "`, so it can be pasted
/// directly after a SELECT or a `SELECT COUNT(*)`.
#[derive(Debug, Clone)]
pub struct WhereClause {
    pub sql: String,
    pub bindings: Vec<FieldValue>,
    offset: usize,
}

impl WhereClause {
    /// Placeholder number for the next binding appended after this clause.
    pub fn next_placeholder(&self) -> usize {
        self.offset + self.bindings.len() + 1
    }
}

/// Builder for one list page's WHERE clause.
pub struct ListQuery<'a> {
    table: &'a str,
    registry: &'a SchemaRegistry,
    conditions: Vec<String>,
    bindings: Vec<FieldValue>,
    placeholder_offset: usize,
}

impl<'a> ListQuery<'a> {
    pub fn new(table: &'a str, registry: &'a SchemaRegistry) -> Self {
        Self {
            table,
            registry,
            conditions: Vec::new(),
            bindings: Vec::new(),
            placeholder_offset: 0,
        }
    }

    /// Start numbering placeholders after `n` caller-supplied bindings.
    pub fn after_placeholders(mut self, n: usize) -> Self {
        self.placeholder_offset = n;
        self
    }

    fn push_binding(&mut self, value: FieldValue) -> usize {
        self.bindings.push(value);
        self.placeholder_offset + self.bindings.len()
    }

    fn column_exists(&self, column: &str) -> bool {
        self.registry.has_column(self.table, column)
    }

    /// Equality filter. Dropped when the column is absent.
    pub fn equals(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        if self.column_exists(column) {
            let n = self.push_binding(value.into());
            self.conditions.push(format!("{column} = ${n}"));
        } else {
            tracing::debug!(table = self.table, column, "dropping filter on absent column");
        }
        self
    }

    /// Equality filter that is a no-op for `None`.
    pub fn maybe_equals<V>(self, column: &str, value: Option<V>) -> Self
    where
        V: Into<FieldValue>,
    {
        match value {
            Some(value) => self.equals(column, value),
            None => self,
        }
    }

    /// Inclusive lower date bound, compared on the value's date part.
    pub fn date_from(mut self, column: &str, bound: Option<NaiveDate>) -> Self {
        if let Some(date) = bound {
            if self.column_exists(column) {
                let n = self.push_binding(FieldValue::Date(date));
                self.conditions.push(format!("{column}::date >= ${n}"));
            }
        }
        self
    }

    /// Inclusive upper date bound, compared on the value's date part.
    pub fn date_to(mut self, column: &str, bound: Option<NaiveDate>) -> Self {
        if let Some(date) = bound {
            if self.column_exists(column) {
                let n = self.push_binding(FieldValue::Date(date));
                self.conditions.push(format!("{column}::date <= ${n}"));
            }
        }
        self
    }

    /// Case-insensitive substring search across `columns`, OR-combined with
    /// one shared `%term%` binding. Blank terms and absent columns are
    /// skipped; when no column survives the whole filter is dropped.
    pub fn search(mut self, term: Option<&str>, columns: &[&str]) -> Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return self,
        };
        let present: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| self.column_exists(c))
            .collect();
        if present.is_empty() {
            tracing::debug!(table = self.table, "no searchable columns present, dropping search");
            return self;
        }
        let n = self.push_binding(FieldValue::Text(format!("%{term}%")));
        let parts: Vec<String> = present
            .iter()
            .map(|c| format!("{c} ILIKE ${n}"))
            .collect();
        self.conditions.push(format!("({})", parts.join(" OR ")));
        self
    }

    /// Apply the row scope and soft-delete predicate and finish the clause.
    ///
    /// `Own` widens to owner-or-assignee when the module has an assignment
    /// column, so a record assigned to the actor stays visible to them after
    /// someone else created it. `Assigned` falls back to the owner column on
    /// installations without the assignment column.
    pub fn assemble(mut self, scope: RowScope, cols: &ScopeColumns, actor_id: i64) -> WhereClause {
        let assignee = cols.assignee.filter(|c| self.column_exists(c));
        match scope {
            RowScope::All => {}
            RowScope::Own => {
                let n = self.push_binding(FieldValue::Int(actor_id));
                let owner = cols.owner;
                match assignee {
                    Some(assignee) => self
                        .conditions
                        .push(format!("({owner} = ${n} OR {assignee} = ${n})")),
                    None => self.conditions.push(format!("{owner} = ${n}")),
                }
            }
            RowScope::Assigned => {
                let n = self.push_binding(FieldValue::Int(actor_id));
                let column = assignee.unwrap_or(cols.owner);
                self.conditions.push(format!("{column} = ${n}"));
            }
        }

        if self.column_exists("deleted_at") {
            self.conditions.push("deleted_at IS NULL".to_string());
        }

        let sql = if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        };
        WhereClause {
            sql,
            bindings: self.bindings,
            offset: self.placeholder_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calls_registry() -> SchemaRegistry {
        SchemaRegistry::default().with_table(
            "calls",
            &[
                "id",
                "title",
                "call_date",
                "outcome",
                "assigned_to",
                "notes",
                "created_by",
                "created_at",
                "updated_at",
            ],
        )
    }

    fn scope_cols() -> ScopeColumns {
        ScopeColumns {
            owner: "created_by",
            assignee: Some("assigned_to"),
        }
    }

    #[test]
    fn filter_on_absent_column_is_dropped_silently() {
        let registry = calls_registry();
        let wc = ListQuery::new("calls", &registry)
            .maybe_equals("follow_up_type", Some("Email"))
            .assemble(RowScope::All, &scope_cols(), 7);
        assert_eq!(wc.sql, "");
        assert!(wc.bindings.is_empty());
    }

    #[test]
    fn filter_on_present_column_is_kept() {
        let registry = calls_registry();
        let wc = ListQuery::new("calls", &registry)
            .equals("outcome", "Interested")
            .assemble(RowScope::All, &scope_cols(), 7);
        assert_eq!(wc.sql, " WHERE outcome = $1");
        assert_eq!(wc.bindings.len(), 1);
    }

    #[test]
    fn search_shares_one_binding_across_columns() {
        let registry = calls_registry();
        let wc = ListQuery::new("calls", &registry)
            .search(Some("roof"), &["title", "notes"])
            .assemble(RowScope::All, &scope_cols(), 7);
        assert_eq!(wc.sql, " WHERE (title ILIKE $1 OR notes ILIKE $1)");
        assert_eq!(wc.bindings.len(), 1);
        assert_eq!(wc.bindings[0], FieldValue::Text("%roof%".to_string()));
    }

    #[test]
    fn blank_search_term_is_skipped() {
        let registry = calls_registry();
        let wc = ListQuery::new("calls", &registry)
            .search(Some("   "), &["title", "notes"])
            .assemble(RowScope::All, &scope_cols(), 7);
        assert_eq!(wc.sql, "");
    }

    #[test]
    fn search_drops_absent_columns_and_then_itself() {
        let registry = calls_registry();
        // One of two columns missing: keep the present one.
        let wc = ListQuery::new("calls", &registry)
            .search(Some("roof"), &["title", "description"])
            .assemble(RowScope::All, &scope_cols(), 7);
        assert_eq!(wc.sql, " WHERE (title ILIKE $1)");

        // Both missing: the filter disappears.
        let wc = ListQuery::new("calls", &registry)
            .search(Some("roof"), &["summary", "description"])
            .assemble(RowScope::All, &scope_cols(), 7);
        assert_eq!(wc.sql, "");
        assert!(wc.bindings.is_empty());
    }

    #[test]
    fn date_bounds_are_inclusive_on_the_date_part() {
        let registry = calls_registry();
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let wc = ListQuery::new("calls", &registry)
            .date_from("call_date", Some(from))
            .date_to("call_date", Some(to))
            .assemble(RowScope::All, &scope_cols(), 7);
        assert_eq!(
            wc.sql,
            " WHERE call_date::date >= $1 AND call_date::date <= $2"
        );
        assert_eq!(wc.bindings, vec![FieldValue::Date(from), FieldValue::Date(to)]);
    }

    #[test]
    fn own_scope_widens_to_assignee_when_present() {
        let registry = calls_registry();
        let wc = ListQuery::new("calls", &registry).assemble(RowScope::Own, &scope_cols(), 7);
        assert_eq!(
            wc.sql,
            " WHERE (created_by = $1 OR assigned_to = $1)"
        );
        assert_eq!(wc.bindings, vec![FieldValue::Int(7)]);
    }

    #[test]
    fn own_scope_without_assignee_column_uses_owner_only() {
        let registry = SchemaRegistry::default().with_table("payments", &["id", "created_by"]);
        let cols = ScopeColumns {
            owner: "created_by",
            assignee: None,
        };
        let wc = ListQuery::new("payments", &registry).assemble(RowScope::Own, &cols, 7);
        assert_eq!(wc.sql, " WHERE created_by = $1");
    }

    #[test]
    fn assigned_scope_falls_back_to_owner_when_column_missing() {
        // Declared assignment column that this installation lacks.
        let registry = SchemaRegistry::default().with_table("work_orders", &["id", "created_by"]);
        let cols = ScopeColumns {
            owner: "created_by",
            assignee: Some("assigned_to"),
        };
        let wc = ListQuery::new("work_orders", &registry).assemble(RowScope::Assigned, &cols, 7);
        assert_eq!(wc.sql, " WHERE created_by = $1");
    }

    #[test]
    fn all_scope_with_no_filters_yields_empty_clause() {
        let registry = calls_registry();
        let wc = ListQuery::new("calls", &registry).assemble(RowScope::All, &scope_cols(), 7);
        assert_eq!(wc.sql, "");
        assert!(wc.bindings.is_empty());
    }

    #[test]
    fn soft_delete_predicate_appears_only_when_column_exists() {
        let registry = SchemaRegistry::default().with_table(
            "calls",
            &["id", "title", "created_by", "deleted_at"],
        );
        let wc = ListQuery::new("calls", &registry).assemble(RowScope::All, &scope_cols(), 7);
        assert_eq!(wc.sql, " WHERE deleted_at IS NULL");
        assert!(wc.bindings.is_empty());
    }

    #[test]
    fn placeholders_number_sequentially_across_mixed_filters() {
        let registry = SchemaRegistry::default().with_table(
            "calls",
            &["id", "title", "call_date", "outcome", "notes", "created_by", "assigned_to"],
        );
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let wc = ListQuery::new("calls", &registry)
            .equals("outcome", "Interested")
            .date_from("call_date", Some(from))
            .search(Some("gutter"), &["title", "notes"])
            .assemble(RowScope::Own, &scope_cols(), 42);
        assert_eq!(
            wc.sql,
            " WHERE outcome = $1 AND call_date::date >= $2 \
             AND (title ILIKE $3 OR notes ILIKE $3) \
             AND (created_by = $4 OR assigned_to = $4)"
        );
        assert_eq!(wc.bindings.len(), 4);
        assert_eq!(wc.next_placeholder(), 5);
    }

    #[test]
    fn placeholder_offset_shifts_numbering() {
        let registry = calls_registry();
        let wc = ListQuery::new("calls", &registry)
            .after_placeholders(2)
            .equals("outcome", "Interested")
            .assemble(RowScope::Own, &scope_cols(), 42);
        assert_eq!(
            wc.sql,
            " WHERE outcome = $3 AND (created_by = $4 OR assigned_to = $4)"
        );
        assert_eq!(wc.bindings.len(), 2);
        assert_eq!(wc.next_placeholder(), 5);
    }
}
