//! Shared application state: pool, schema registry, gate, stores.

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;

use opsdesk_core::{PermissionGate, SchemaRegistry, SessionStore};
use opsdesk_postgres::{
    CallsService, ClaimsService, MeetingsService, PaymentsService, PgPermissionStore,
    PgSchemaProbe, PgSessionStore, RolesAdminService, WorkOrdersService, CALLS, CLAIMS,
    MEETINGS, PAYMENTS, WORK_ORDERS,
};

use crate::uploads::AttachmentStore;

/// The tables the registry probes at startup. Anything else fails closed.
pub const MODULE_TABLES: [&str; 5] = [
    CALLS.table,
    MEETINGS.table,
    PAYMENTS.table,
    WORK_ORDERS.table,
    CLAIMS.table,
];

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<SchemaRegistry>,
    pub gate: Arc<PermissionGate>,
    pub sessions: Arc<dyn SessionStore>,
    pub attachments: AttachmentStore,
}

impl AppState {
    /// Probe the schema, fix the gate mode, wire the stores. One-time setup;
    /// the registry and mode then hold for the process lifetime.
    pub async fn initialize(pool: PgPool, upload_root: PathBuf) -> anyhow::Result<Self> {
        let probe = PgSchemaProbe::new(pool.clone());
        let registry = Arc::new(SchemaRegistry::build(&probe, &MODULE_TABLES).await);
        let gate = Arc::new(
            PermissionGate::connect(Arc::new(PgPermissionStore::new(pool.clone()))).await?,
        );
        let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
        Ok(Self {
            pool,
            registry,
            gate,
            sessions,
            attachments: AttachmentStore::new(upload_root),
        })
    }

    pub fn calls(&self) -> CallsService {
        CallsService::new(self.pool.clone(), self.registry.clone())
    }

    pub fn meetings(&self) -> MeetingsService {
        MeetingsService::new(self.pool.clone(), self.registry.clone())
    }

    pub fn payments(&self) -> PaymentsService {
        PaymentsService::new(self.pool.clone(), self.registry.clone())
    }

    pub fn work_orders(&self) -> WorkOrdersService {
        WorkOrdersService::new(self.pool.clone(), self.registry.clone())
    }

    pub fn claims(&self) -> ClaimsService {
        ClaimsService::new(self.pool.clone(), self.registry.clone())
    }

    pub fn roles(&self) -> RolesAdminService {
        RolesAdminService::new(self.pool.clone())
    }
}
