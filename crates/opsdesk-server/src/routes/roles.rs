//! Role administration routes.
//!
//! The add form grants one resource's flags per submission; an
//! administrator builds a role up resource by resource. Checkbox fields
//! arrive only when checked.

use axum::extract::{Form, Path, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Extension;
use axum::Router;
use serde::Deserialize;

use opsdesk_core::{Action, CurrentUser, GrantFlags, OpsError, RowScope};
use opsdesk_postgres::RoleGrantInput;

use crate::error::AppError;
use crate::html;
use crate::routes::{flash_redirect, forms, take_flash};
use crate::state::AppState;

const RESOURCE: &str = "roles";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/roles", get(index))
        .route("/roles/add", post(add))
        .route("/roles/:id/assign", post(assign))
        .route("/roles/:id/delete", post(delete))
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleAddForm {
    pub name: Option<String>,
    pub resource: Option<String>,
    pub can_create: Option<String>,
    pub can_view_all: Option<String>,
    pub can_view_own: Option<String>,
    pub can_edit_all: Option<String>,
    pub can_edit_own: Option<String>,
    pub can_delete: Option<String>,
    pub can_export: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignForm {
    pub user_id: Option<String>,
}

async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, RESOURCE, Action::View, RowScope::Own)
        .await?;
    let roles = state.roles().list().await?;
    let rows: Vec<Vec<String>> = roles
        .iter()
        .map(|role| {
            let resources: Vec<&str> = role.grants.iter().map(|(r, _)| r.as_str()).collect();
            vec![
                role.id.to_string(),
                role.name.clone(),
                if role.active { "active" } else { "inactive" }.to_string(),
                resources.join(", "),
            ]
        })
        .collect();
    let flash = take_flash(&state, &user).await;
    let body = html::table(&["id", "name", "state", "resources"], &rows);
    Ok(Html(html::page("Roles", flash.as_deref(), &body)).into_response())
}

async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<RoleAddForm>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, RESOURCE, Action::Create, RowScope::Own)
        .await?;
    let name = forms::non_empty(form.name.as_deref()).unwrap_or_default();
    let grants: Vec<RoleGrantInput> = forms::non_empty(form.resource.as_deref())
        .map(|resource| {
            vec![RoleGrantInput {
                resource,
                flags: GrantFlags {
                    can_create: forms::checkbox(form.can_create.as_deref()),
                    can_view_all: forms::checkbox(form.can_view_all.as_deref()),
                    can_view_own: forms::checkbox(form.can_view_own.as_deref()),
                    can_edit_all: forms::checkbox(form.can_edit_all.as_deref()),
                    can_edit_own: forms::checkbox(form.can_edit_own.as_deref()),
                    can_delete: forms::checkbox(form.can_delete.as_deref()),
                    can_export: forms::checkbox(form.can_export.as_deref()),
                },
            }]
        })
        .unwrap_or_default();
    match state.roles().create(&name, &grants).await {
        Ok(_) => Ok(flash_redirect(&state, &user, "Role created.", "/roles").await),
        Err(OpsError::ValidationFailed(errors)) => Ok((
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            Html(html::page("Roles", None, &html::error_list(&errors))),
        )
            .into_response()),
        Err(err) => Err(err.into()),
    }
}

async fn assign(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Form(form): Form<AssignForm>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, RESOURCE, Action::Edit, RowScope::Own)
        .await?;
    let Some(target) = forms::parse_i64(form.user_id.as_deref()) else {
        return Ok((
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            Html(html::page(
                "Roles",
                None,
                &html::error_list(&["A user is required.".to_string()]),
            )),
        )
            .into_response());
    };
    match state.roles().assign(id, target).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Role assigned.", "/roles").await),
        Err(OpsError::NotFound(_)) => {
            Ok(flash_redirect(&state, &user, "Role was not found.", "/roles").await)
        }
        Err(err) => Err(err.into()),
    }
}

async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, RESOURCE, Action::Delete, RowScope::Own)
        .await?;
    match state.roles().delete(id).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Role deleted.", "/roles").await),
        Err(OpsError::NotFound(_)) => {
            Ok(flash_redirect(&state, &user, "Role was not found.", "/roles").await)
        }
        Err(err) => Err(err.into()),
    }
}
