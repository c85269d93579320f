//! Mapping domain failures onto HTTP responses.
//!
//! Handlers return `Result<_, AppError>` and lean on `?`; the policy for
//! each error kind lives here once. Diagnostic detail never reaches the
//! response body, only the log.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use opsdesk_core::OpsError;

use crate::html;

pub struct AppError(pub OpsError);

impl From<OpsError> for AppError {
    fn from(err: OpsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.0 {
            OpsError::Unauthorized(reason) => {
                tracing::info!(%reason, "request denied");
                // Control never returns to handler logic on denial.
                Redirect::to("/unauthorized").into_response()
            }
            OpsError::ValidationFailed(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(html::page(
                    "Validation failed",
                    None,
                    &html::error_list(&errors),
                )),
            )
                .into_response(),
            err @ OpsError::NotFound(_) => {
                (StatusCode::NOT_FOUND, err.user_message()).into_response()
            }
            err @ OpsError::StorageFailed { .. } => {
                tracing::error!(
                    detail = err.diagnostic().unwrap_or("none"),
                    "storage failure"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, err.user_message()).into_response()
            }
            err @ OpsError::Internal(_) => {
                tracing::error!(error = %err, "internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, err.user_message()).into_response()
            }
        }
    }
}
