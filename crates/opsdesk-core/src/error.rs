use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpsError>;

/// Error taxonomy for the record services.
///
/// Every variant carries a message safe to show to the signed-in user.
/// Engine-level diagnostics (driver error text, paths) ride along as
/// `detail` on `StorageFailed` and are only ever logged, never rendered.
#[derive(Debug, Error)]
pub enum OpsError {
    /// User input rejected. The list is accumulated, not first-failure.
    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A database or filesystem write could not be completed.
    #[error("storage failed: {message}")]
    StorageFailed {
        message: String,
        detail: Option<String>,
    },

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OpsError {
    /// Single-message validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(vec![message.into()])
    }

    pub fn storage(message: impl Into<String>, detail: Option<String>) -> Self {
        Self::StorageFailed {
            message: message.into(),
            detail,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationFailed(_) => 422,
            Self::NotFound(_) => 404,
            Self::Unauthorized(_) => 403,
            Self::StorageFailed { .. } => 500,
            Self::Internal(_) => 500,
        }
    }

    /// The message callers may render. For internal failures this is a
    /// fixed string; the real cause goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::ValidationFailed(errors) => errors.join("; "),
            Self::NotFound(what) => format!("{what} was not found."),
            Self::Unauthorized(_) => "You do not have permission to do that.".to_string(),
            Self::StorageFailed { message, .. } => message.clone(),
            Self::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Operator-facing diagnostic, when one was captured.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::StorageFailed { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_validation_failed() {
        assert_eq!(OpsError::validation("x").http_status(), 422);
    }

    #[test]
    fn http_status_not_found() {
        assert_eq!(OpsError::NotFound("call".into()).http_status(), 404);
    }

    #[test]
    fn http_status_unauthorized() {
        assert_eq!(OpsError::Unauthorized("nope".into()).http_status(), 403);
    }

    #[test]
    fn http_status_storage_failed() {
        assert_eq!(OpsError::storage("x", None).http_status(), 500);
    }

    #[test]
    fn http_status_internal() {
        let err = OpsError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn validation_accumulates_in_display() {
        let err = OpsError::ValidationFailed(vec!["Title is required.".into(), "Bad date.".into()]);
        assert_eq!(
            err.to_string(),
            "validation failed: Title is required.; Bad date."
        );
    }

    #[test]
    fn user_message_hides_storage_detail() {
        let err = OpsError::storage(
            "The record could not be saved.",
            Some("duplicate key value violates unique constraint".into()),
        );
        let msg = err.user_message();
        assert_eq!(msg, "The record could not be saved.");
        assert!(!msg.contains("duplicate key"));
    }

    #[test]
    fn diagnostic_surfaces_storage_detail_only() {
        let err = OpsError::storage("save failed", Some("pq: relation missing".into()));
        assert_eq!(err.diagnostic(), Some("pq: relation missing"));
        assert_eq!(OpsError::NotFound("x".into()).diagnostic(), None);
    }

    #[test]
    fn user_message_for_internal_is_generic() {
        let err = OpsError::Internal(anyhow::anyhow!("stack trace soup"));
        assert!(!err.user_message().contains("soup"));
    }
}
