//! Which columns actually exist, per table, in this deployment.
//!
//! The business tables are allowed to differ between installations: optional
//! columns may or may not have been added. Every SELECT/INSERT/UPDATE the
//! services issue is constructed against this registry, so a statement can
//! never reference a column the deployment does not have.
//!
//! The registry is built once at startup (one probe query per registered
//! table) and is immutable afterwards; share it behind an `Arc`. A table
//! whose probe fails is recorded with an empty column set, so lookups fail
//! closed and the optional features simply disappear instead of erroring.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::error::Result;
use crate::filter::ScopeColumns;
use crate::gate::RowScope;

/// Introspection port. The PostgreSQL adapter answers from
/// `information_schema.columns`.
#[async_trait]
pub trait SchemaProbe: Send + Sync {
    async fn table_columns(&self, table: &str) -> Result<HashSet<String>>;
}

/// Immutable table → column-set map.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, HashSet<String>>,
}

impl SchemaRegistry {
    /// Probe every registered table once. Probe failures are logged and
    /// recorded as empty sets rather than propagated.
    pub async fn build(probe: &dyn SchemaProbe, tables: &[&str]) -> Self {
        let mut registry = Self::default();
        for table in tables {
            let columns = match probe.table_columns(table).await {
                Ok(cols) => {
                    if cols.is_empty() {
                        tracing::warn!(table, "schema probe found no columns; table missing?");
                    }
                    cols
                }
                Err(err) => {
                    tracing::warn!(table, error = %err, "schema probe failed; treating table as empty");
                    HashSet::new()
                }
            };
            registry.tables.insert(table.to_string(), columns);
        }
        registry
    }

    /// Test/bootstrap constructor with a fixed column set.
    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.tables.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// False for unknown tables and unknown columns alike.
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .map(|cols| cols.contains(column))
            .unwrap_or(false)
    }

    pub fn columns(&self, table: &str) -> Option<&HashSet<String>> {
        self.tables.get(table)
    }

    pub fn is_registered(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }
}

/// Static descriptor one record service owns: the table it writes, the
/// permission resource it is gated by, and the column roles the adaptive
/// layer needs to know about.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub table: &'static str,
    /// Permission resource key, e.g. `"calls"`.
    pub resource: &'static str,
    /// Assumed present in every deployment.
    pub base_columns: &'static [&'static str],
    /// Selected/written only where they exist.
    pub optional_columns: &'static [&'static str],
    /// Free-text search targets (may include optional columns).
    pub text_search_columns: &'static [&'static str],
    /// Creator column for Own-scoped rows.
    pub owner_column: &'static str,
    /// Assignment column, for modules that route work to people.
    pub assignee_column: Option<&'static str>,
    /// The scope a `*-own` capability grants on this module.
    pub restricted_scope: RowScope,
}

impl TableSpec {
    pub fn all_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.base_columns
            .iter()
            .chain(self.optional_columns.iter())
            .copied()
    }

    pub fn scope_columns(&self) -> ScopeColumns {
        ScopeColumns {
            owner: self.owner_column,
            assignee: self.assignee_column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe;

    #[async_trait]
    impl SchemaProbe for FixedProbe {
        async fn table_columns(&self, table: &str) -> Result<HashSet<String>> {
            match table {
                "calls" => Ok(["id", "title", "call_date"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect()),
                "broken" => Err(crate::error::OpsError::storage(
                    "probe failed",
                    Some("connection reset".into()),
                )),
                _ => Ok(HashSet::new()),
            }
        }
    }

    #[tokio::test]
    async fn build_probes_each_registered_table() {
        let registry = SchemaRegistry::build(&FixedProbe, &["calls", "meetings"]).await;
        assert!(registry.has_column("calls", "title"));
        assert!(registry.is_registered("meetings"));
        assert!(!registry.has_column("meetings", "title"));
    }

    #[tokio::test]
    async fn probe_failure_fails_closed() {
        let registry = SchemaRegistry::build(&FixedProbe, &["broken"]).await;
        assert!(registry.is_registered("broken"));
        assert!(!registry.has_column("broken", "id"));
        assert!(!registry.has_column("broken", "anything"));
    }

    #[test]
    fn unknown_table_is_all_false() {
        let registry = SchemaRegistry::default();
        assert!(!registry.has_column("calls", "id"));
        assert!(registry.columns("calls").is_none());
    }

    #[test]
    fn with_table_fixture_lookup() {
        let registry = SchemaRegistry::default().with_table("calls", &["id", "title"]);
        assert!(registry.has_column("calls", "id"));
        assert!(!registry.has_column("calls", "follow_up_date"));
    }
}
