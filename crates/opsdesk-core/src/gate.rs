//! Capability checks against role-based grants.
//!
//! Two modes, decided once at startup. When the permission tables have not
//! been installed yet the gate runs in *bootstrap* mode and grants
//! everything, so a fresh installation stays usable before an administrator
//! configures roles. That state is deliberately loud: it is logged at warn
//! level and reported by the health endpoint, because from the inside it is
//! indistinguishable from a half-migrated production database.
//!
//! The gate answers *capability* only. Row-level visibility is returned as a
//! [`RowScope`] inside the decision, and the list assembler requires that
//! scope as an argument, so the row filter is applied centrally rather than
//! re-implemented per page.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{OpsError, Result};

/// The actions a grant can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    View,
    Edit,
    Delete,
    Export,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::View => "view",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Export => "export",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Row visibility attached to a granted View/Edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowScope {
    /// Every row.
    All,
    /// Rows assigned to the actor.
    Assigned,
    /// Rows the actor created (widened to owner-or-assignee by the list
    /// assembler when the module has an assignment column).
    Own,
}

/// Outcome of a granted check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub scope: RowScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Permission tables absent; everything is granted.
    Bootstrap,
    /// Grants are looked up and enforced.
    Enforced,
}

impl GateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Enforced => "enforced",
        }
    }
}

/// Effective capability flags of one active grant row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrantFlags {
    pub can_create: bool,
    pub can_view_all: bool,
    pub can_view_own: bool,
    pub can_edit_all: bool,
    pub can_edit_own: bool,
    pub can_delete: bool,
    pub can_export: bool,
}

/// Storage port for grants. Implementations must only return grants whose
/// role and permission rows are both active.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Whether all three permission tables exist.
    async fn installed(&self) -> Result<bool>;

    /// Active grants for the actor's active roles on one resource.
    async fn grants_for(&self, actor_id: i64, resource: &str) -> Result<Vec<GrantFlags>>;
}

pub struct PermissionGate {
    store: Arc<dyn PermissionStore>,
    mode: GateMode,
}

impl PermissionGate {
    /// Probe the store once and fix the mode for the process lifetime.
    pub async fn connect(store: Arc<dyn PermissionStore>) -> Result<Self> {
        let mode = if store.installed().await? {
            GateMode::Enforced
        } else {
            tracing::warn!(
                "permission tables not installed; gate running in BOOTSTRAP mode: \
                 every action is granted to every signed-in user"
            );
            GateMode::Bootstrap
        };
        Ok(Self { store, mode })
    }

    /// Test constructor with an explicit mode.
    pub fn with_mode(store: Arc<dyn PermissionStore>, mode: GateMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    /// Capability check. `restricted_scope` is the module's scope for the
    /// `*-own` flags (work orders hand out Assigned, the rest Own).
    pub async fn decide(
        &self,
        actor_id: i64,
        resource: &str,
        action: Action,
        restricted_scope: RowScope,
    ) -> Result<Option<AccessDecision>> {
        if self.mode == GateMode::Bootstrap {
            return Ok(Some(AccessDecision {
                scope: RowScope::All,
            }));
        }

        let grants = self.store.grants_for(actor_id, resource).await?;

        let scope = match action {
            Action::Create => grants.iter().any(|g| g.can_create).then_some(RowScope::All),
            Action::Delete => grants.iter().any(|g| g.can_delete).then_some(RowScope::All),
            Action::Export => grants.iter().any(|g| g.can_export).then_some(RowScope::All),
            Action::View => {
                if grants.iter().any(|g| g.can_view_all) {
                    Some(RowScope::All)
                } else if grants.iter().any(|g| g.can_view_own) {
                    Some(restricted_scope)
                } else {
                    None
                }
            }
            Action::Edit => {
                if grants.iter().any(|g| g.can_edit_all) {
                    Some(RowScope::All)
                } else if grants.iter().any(|g| g.can_edit_own) {
                    Some(restricted_scope)
                } else {
                    None
                }
            }
        };

        Ok(scope.map(|scope| AccessDecision { scope }))
    }

    pub async fn can_perform(&self, actor_id: i64, resource: &str, action: Action) -> Result<bool> {
        Ok(self
            .decide(actor_id, resource, action, RowScope::Own)
            .await?
            .is_some())
    }

    /// `decide` with denial mapped to `Unauthorized`. The server layer turns
    /// that into a redirect, so handler logic never runs on denial.
    pub async fn require(
        &self,
        actor_id: i64,
        resource: &str,
        action: Action,
        restricted_scope: RowScope,
    ) -> Result<AccessDecision> {
        self.decide(actor_id, resource, action, restricted_scope)
            .await?
            .ok_or_else(|| {
                OpsError::Unauthorized(format!(
                    "actor {actor_id} may not {action} on {resource}"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeStore {
        installed: bool,
        grants: Vec<GrantFlags>,
    }

    #[async_trait]
    impl PermissionStore for FakeStore {
        async fn installed(&self) -> Result<bool> {
            Ok(self.installed)
        }

        async fn grants_for(&self, _actor_id: i64, _resource: &str) -> Result<Vec<GrantFlags>> {
            Ok(self.grants.clone())
        }
    }

    fn gate(installed: bool, grants: Vec<GrantFlags>) -> PermissionGate {
        let mode = if installed {
            GateMode::Enforced
        } else {
            GateMode::Bootstrap
        };
        PermissionGate::with_mode(Arc::new(FakeStore { installed, grants }), mode)
    }

    const ALL_ACTIONS: [Action; 5] = [
        Action::Create,
        Action::View,
        Action::Edit,
        Action::Delete,
        Action::Export,
    ];

    #[tokio::test]
    async fn bootstrap_grants_every_triple() {
        let gate = gate(false, vec![]);
        for action in ALL_ACTIONS {
            assert!(gate.can_perform(9, "calls", action).await.unwrap());
        }
        let decision = gate
            .decide(9, "calls", Action::View, RowScope::Own)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.scope, RowScope::All);
    }

    #[tokio::test]
    async fn enforced_with_zero_grants_denies_every_triple() {
        let gate = gate(true, vec![]);
        for action in ALL_ACTIONS {
            assert!(!gate.can_perform(9, "calls", action).await.unwrap());
        }
    }

    #[tokio::test]
    async fn connect_picks_mode_from_store() {
        let enforced = PermissionGate::connect(Arc::new(FakeStore {
            installed: true,
            grants: vec![],
        }))
        .await
        .unwrap();
        assert_eq!(enforced.mode(), GateMode::Enforced);

        let bootstrap = PermissionGate::connect(Arc::new(FakeStore {
            installed: false,
            grants: vec![],
        }))
        .await
        .unwrap();
        assert_eq!(bootstrap.mode(), GateMode::Bootstrap);
    }

    #[tokio::test]
    async fn view_all_beats_view_own() {
        let grants = vec![GrantFlags {
            can_view_all: true,
            can_view_own: true,
            ..Default::default()
        }];
        let decision = gate(true, grants)
            .decide(9, "calls", Action::View, RowScope::Own)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.scope, RowScope::All);
    }

    #[tokio::test]
    async fn view_own_yields_the_module_restricted_scope() {
        let grants = vec![GrantFlags {
            can_view_own: true,
            ..Default::default()
        }];
        let g = gate(true, grants);
        let own = g
            .decide(9, "calls", Action::View, RowScope::Own)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(own.scope, RowScope::Own);
        let assigned = g
            .decide(9, "work_orders", Action::View, RowScope::Assigned)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assigned.scope, RowScope::Assigned);
    }

    #[tokio::test]
    async fn grants_or_across_roles() {
        // One role grants create, another grants export; together the actor
        // holds both capabilities.
        let grants = vec![
            GrantFlags {
                can_create: true,
                ..Default::default()
            },
            GrantFlags {
                can_export: true,
                ..Default::default()
            },
        ];
        let g = gate(true, grants);
        assert!(g.can_perform(9, "payments", Action::Create).await.unwrap());
        assert!(g.can_perform(9, "payments", Action::Export).await.unwrap());
        assert!(!g.can_perform(9, "payments", Action::Delete).await.unwrap());
    }

    #[tokio::test]
    async fn require_maps_denial_to_unauthorized() {
        let g = gate(true, vec![]);
        let err = g
            .require(9, "claims", Action::Edit, RowScope::Own)
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::Unauthorized(_)));
        assert_eq!(err.http_status(), 403);
    }

    #[tokio::test]
    async fn edit_own_scope_flows_through_require() {
        let grants = vec![GrantFlags {
            can_edit_own: true,
            ..Default::default()
        }];
        let decision = gate(true, grants)
            .require(9, "calls", Action::Edit, RowScope::Own)
            .await
            .unwrap();
        assert_eq!(decision.scope, RowScope::Own);
    }
}
