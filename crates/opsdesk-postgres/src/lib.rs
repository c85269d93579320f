//! opsdesk PostgreSQL adapter.
//!
//! Implements the opsdesk-core port traits (`SchemaProbe`, `PermissionStore`,
//! `SessionStore`) and hosts the per-module record services built on the
//! shared adaptive builders. All SQL is runtime-checked (sqlx::query, not
//! sqlx::query!) because the statements are assembled against whatever
//! columns the deployment actually has.

pub mod calls;
pub mod claims;
mod exec;
pub mod export;
pub mod meetings;
pub mod payments;
pub mod permissions;
pub mod probe;
pub mod roles;
pub mod sessions;
pub mod work_orders;

pub use calls::{CallFilters, CallInput, CallRecord, CallsService, CALLS, CALL_OUTCOMES};
pub use claims::{ClaimFilters, ClaimInput, ClaimRecord, ClaimsService, CLAIMS, CLAIM_CATEGORIES};
pub use meetings::{MeetingFilters, MeetingInput, MeetingRecord, MeetingsService, MEETINGS};
pub use payments::{
    PaymentFilters, PaymentInput, PaymentRecord, PaymentsService, PAYMENTS, PAYMENT_METHODS,
};
pub use permissions::PgPermissionStore;
pub use probe::PgSchemaProbe;
pub use roles::{RoleGrantInput, RoleRecord, RolesAdminService};
pub use sessions::PgSessionStore;
pub use work_orders::{
    WorkOrderFilters, WorkOrderInput, WorkOrderRecord, WorkOrdersService, WORK_ORDERS,
    WORK_ORDER_PRIORITIES, WORK_ORDER_STATUSES,
};
