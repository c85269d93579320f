//! opsdesk core — domain layer for the schema-adaptive record services.
//!
//! Everything here is pure: value types, SQL text construction, capability
//! decisions, upload policy checks, and the port traits the PostgreSQL
//! adapter implements. No sqlx, no filesystem, no HTTP.

pub mod error;
pub mod field;
pub mod filter;
pub mod gate;
pub mod mutation;
pub mod projection;
pub mod schema;
pub mod session;
pub mod upload;

// Re-export the types nearly every caller touches.
pub use error::{OpsError, Result};
pub use field::{FieldKind, FieldValue, RecordFields};
pub use filter::{ListQuery, ScopeColumns, WhereClause};
pub use gate::{AccessDecision, Action, GateMode, GrantFlags, PermissionGate, PermissionStore, RowScope};
pub use mutation::{build_insert, build_update, MutationError, SqlStatement};
pub use projection::{Projection, ResolvedProjection};
pub use schema::{SchemaProbe, SchemaRegistry, TableSpec};
pub use session::{CurrentUser, SessionRecord, SessionStore};
pub use upload::UploadPolicy;
