//! SELECT-list construction against the schema registry.

use crate::schema::{SchemaRegistry, TableSpec};

/// Last-resort column set when a projection resolves to nothing at all.
/// Keeps the query constructible; not expected outside broken deployments.
pub const FALLBACK_COLUMNS: [&str; 2] = ["id", "created_at"];

/// Declared projection: base columns are always selected (assumed present),
/// optional columns only where the deployment has them.
#[derive(Debug, Clone)]
pub struct Projection {
    base: Vec<&'static str>,
    optional: Vec<&'static str>,
}

impl Projection {
    pub fn new(base: &[&'static str]) -> Self {
        Self {
            base: base.to_vec(),
            optional: Vec::new(),
        }
    }

    pub fn optional(mut self, columns: &[&'static str]) -> Self {
        self.optional.extend_from_slice(columns);
        self
    }

    pub fn for_spec(spec: &TableSpec) -> Self {
        Self::new(spec.base_columns).optional(spec.optional_columns)
    }

    /// Base columns first, then optional columns in declared order,
    /// filtered to those that exist.
    pub fn resolve(&self, registry: &SchemaRegistry, table: &str) -> ResolvedProjection {
        let mut columns: Vec<&'static str> = self.base.clone();
        for col in &self.optional {
            if registry.has_column(table, col) {
                columns.push(col);
            }
        }
        if columns.is_empty() {
            columns = FALLBACK_COLUMNS.to_vec();
        }
        ResolvedProjection { columns }
    }
}

/// The concrete column list one query will select.
#[derive(Debug, Clone)]
pub struct ResolvedProjection {
    columns: Vec<&'static str>,
}

impl ResolvedProjection {
    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| *c == column)
    }

    /// Comma-joined list for interpolation into SELECT text.
    pub fn column_list(&self) -> String {
        self.columns.join(", ")
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calls_registry() -> SchemaRegistry {
        SchemaRegistry::default().with_table(
            "calls",
            &["id", "title", "call_date", "created_at", "lead_id"],
        )
    }

    #[test]
    fn base_then_optional_in_declared_order() {
        let projection = Projection::new(&["id", "title", "call_date"])
            .optional(&["follow_up_date", "lead_id"]);
        let resolved = projection.resolve(&calls_registry(), "calls");
        // follow_up_date does not exist, lead_id does.
        assert_eq!(resolved.columns(), &["id", "title", "call_date", "lead_id"]);
    }

    #[test]
    fn base_columns_are_never_filtered() {
        // Base columns are assumed present even when the registry has no
        // entry for the table; only optional columns are probed.
        let projection = Projection::new(&["id", "title"]).optional(&["notes"]);
        let resolved = projection.resolve(&SchemaRegistry::default(), "calls");
        assert_eq!(resolved.columns(), &["id", "title"]);
    }

    #[test]
    fn empty_resolution_falls_back_to_minimal_set() {
        let projection = Projection::new(&[]).optional(&["ghost_a", "ghost_b"]);
        let resolved = projection.resolve(&SchemaRegistry::default(), "calls");
        assert_eq!(resolved.columns(), &FALLBACK_COLUMNS);
    }

    #[test]
    fn column_list_joins_with_commas() {
        let projection = Projection::new(&["id", "title"]);
        let resolved = projection.resolve(&calls_registry(), "calls");
        assert_eq!(resolved.column_list(), "id, title");
    }

    #[test]
    fn contains_reports_selected_columns() {
        let projection = Projection::new(&["id"]).optional(&["lead_id", "follow_up_date"]);
        let resolved = projection.resolve(&calls_registry(), "calls");
        assert!(resolved.contains("lead_id"));
        assert!(!resolved.contains("follow_up_date"));
    }
}
