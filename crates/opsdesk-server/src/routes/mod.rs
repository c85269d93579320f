//! Router assembly and the redirect/flash helpers the handlers share.

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use opsdesk_core::CurrentUser;

use crate::session_mw;
use crate::state::AppState;

pub mod calls;
pub mod claims;
mod forms;
pub mod meetings;
pub mod payments;
pub mod roles;
pub mod shared;
pub mod work_orders;

/// Generous request cap; per-module attachment limits are enforced by the
/// upload policy, which produces a form error instead of a bare 413.
const BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(calls::router())
        .merge(meetings::router())
        .merge(payments::router())
        .merge(work_orders::router())
        .merge(claims::router())
        .merge(roles::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_mw::require_session,
        ));

    Router::new()
        .route("/health", get(shared::health))
        .route("/login", get(shared::login))
        .route("/unauthorized", get(shared::unauthorized))
        .merge(protected)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Store a flash message on the actor's session and answer 303. The message
/// surfaces in the banner of the next page they load.
pub(crate) async fn flash_redirect(
    state: &AppState,
    user: &CurrentUser,
    message: &str,
    to: &str,
) -> Response {
    if let Err(err) = state.sessions.set_flash(&user.session_token, message).await {
        tracing::warn!(error = %err, "failed to store flash message");
    }
    Redirect::to(to).into_response()
}

/// Consume the pending flash message, if any, for the page being rendered.
pub(crate) async fn take_flash(state: &AppState, user: &CurrentUser) -> Option<String> {
    match state.sessions.take_flash(&user.session_token).await {
        Ok(flash) => flash,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read flash message");
            None
        }
    }
}

/// CSV download response: UTF-8 BOM-prefixed bytes behind an attachment
/// disposition.
pub(crate) fn csv_response(filename: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from(bytes),
    )
        .into_response()
}
