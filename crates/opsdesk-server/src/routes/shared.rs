//! Public routes: health, the login placeholder, the denial page.

use axum::extract::State;
use axum::response::Html;
use axum::Json;
use serde_json::json;

use crate::html;
use crate::state::AppState;

/// Reports the gate mode so an access-control-free deployment is visible
/// at a glance, not just in the startup log.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "permission_mode": state.gate.mode().as_str(),
    }))
}

/// Session establishment is an external collaborator; this is only the
/// target of the unauthenticated redirect.
pub async fn login() -> Html<String> {
    Html(html::page(
        "Sign in",
        None,
        "<p>Please sign in to continue.</p>",
    ))
}

pub async fn unauthorized() -> Html<String> {
    Html(html::page(
        "Unauthorized",
        None,
        "<p>You do not have permission to do that.</p>",
    ))
}
