//! Signed-in user resolution.
//!
//! A session is a row in the `sessions` table keyed by the opaque token from
//! the `opsdesk_session` cookie. Establishing one (login) is an external
//! collaborator's job; this crate only resolves tokens and carries the
//! one-shot flash message that survives a redirect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// One row of the `sessions` table.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: i64,
    pub display_name: String,
    pub flash: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// The actor attached to a request after its session resolved.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub display_name: String,
    pub session_token: String,
}

impl CurrentUser {
    pub fn from_session(record: &SessionRecord) -> Self {
        Self {
            user_id: record.user_id,
            display_name: record.display_name.clone(),
            session_token: record.token.clone(),
        }
    }
}

/// Storage port for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve a token to a live session. Expired rows resolve to `None`.
    async fn find(&self, token: &str) -> Result<Option<SessionRecord>>;

    /// Store the message shown on the actor's next page load.
    async fn set_flash(&self, token: &str, message: &str) -> Result<()>;

    /// Read and clear the flash message in one step.
    async fn take_flash(&self, token: &str) -> Result<Option<String>>;
}
