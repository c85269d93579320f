//! Reimbursement claim routes, including the approve/reject workflow.
//!
//! Approving or rejecting requires Edit with scope All — a reviewer who can
//! only edit their own claims must not resolve anyone's, including their
//! own.

use axum::extract::{Form, Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Extension;
use axum::Router;
use serde::Deserialize;

use opsdesk_core::{Action, CurrentUser, OpsError, RowScope};
use opsdesk_postgres::claims::{ClaimFilters, ClaimInput, ClaimRecord};
use opsdesk_postgres::CLAIMS;

use crate::error::AppError;
use crate::html;
use crate::routes::{csv_response, flash_redirect, forms, take_flash};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/claims", get(index))
        .route("/claims/my", get(my))
        .route("/claims/export", get(export))
        .route("/claims/add", post(add))
        .route("/claims/:id", get(view))
        .route("/claims/:id/edit", post(edit))
        .route("/claims/:id/delete", post(delete))
        .route("/claims/:id/approve", post(approve))
        .route("/claims/:id/reject", post(reject))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimForm {
    pub claim_date: Option<String>,
    pub category: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
}

impl ClaimForm {
    fn into_input(self) -> ClaimInput {
        ClaimInput {
            claim_date: forms::parse_date(self.claim_date.as_deref()),
            category: forms::non_empty(self.category.as_deref()).unwrap_or_default(),
            amount: forms::parse_decimal(self.amount.as_deref()),
            description: forms::non_empty(self.description.as_deref()).unwrap_or_default(),
        }
    }
}

fn filters_from(params: &forms::ListParams) -> ClaimFilters {
    ClaimFilters {
        q: forms::non_empty(params.q.as_deref()),
        from: forms::parse_date(params.from.as_deref()),
        to: forms::parse_date(params.to.as_deref()),
        category: forms::non_empty(params.category.as_deref()),
        status: forms::non_empty(params.status.as_deref()),
    }
}

fn invalid_form(action: &str, errors: Vec<String>, input: &ClaimInput) -> Response {
    let fields = vec![
        (
            "claim_date",
            input.claim_date.map(|d| d.to_string()).unwrap_or_default(),
        ),
        ("category", input.category.clone()),
        (
            "amount",
            input.amount.map(|a| a.to_string()).unwrap_or_default(),
        ),
        ("description", input.description.clone()),
    ];
    (
        axum::http::StatusCode::UNPROCESSABLE_ENTITY,
        Html(html::form_page("Claim", action, &errors, &fields)),
    )
        .into_response()
}

async fn render_list(
    state: &AppState,
    user: &CurrentUser,
    scope: RowScope,
    params: &forms::ListParams,
    title: &str,
) -> Result<Response, AppError> {
    let records = state
        .claims()
        .list(user.user_id, scope, &filters_from(params))
        .await?;
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.claim_date.to_string(),
                r.category.clone(),
                r.amount.to_string(),
                r.status.clone(),
            ]
        })
        .collect();
    let flash = take_flash(state, user).await;
    let body = html::table(&["id", "claim_date", "category", "amount", "status"], &rows);
    Ok(Html(html::page(title, flash.as_deref(), &body)).into_response())
}

async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, CLAIMS.resource, Action::View, CLAIMS.restricted_scope)
        .await?;
    render_list(&state, &user, decision.scope, &params, "Claims").await
}

async fn my(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, CLAIMS.resource, Action::View, CLAIMS.restricted_scope)
        .await?;
    render_list(&state, &user, RowScope::Assigned, &params, "My claims").await
}

fn render_view(record: &ClaimRecord, flash: Option<&str>) -> Html<String> {
    let mut pairs = vec![
        ("Claim date", record.claim_date.to_string(), false),
        ("Category", record.category.clone(), false),
        ("Amount", record.amount.to_string(), false),
        ("Description", record.description.clone(), false),
        ("Status", html::badge(&record.status), true),
    ];
    if let Some(approved_by) = record.approved_by {
        pairs.push(("Resolved by", approved_by.to_string(), false));
    }
    if let Some(approved_at) = record.approved_at {
        pairs.push((
            "Resolved at",
            approved_at.format("%Y-%m-%d %H:%M").to_string(),
            false,
        ));
    }
    Html(html::page("Claim", flash, &html::detail_rows(&pairs)))
}

async fn view(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, CLAIMS.resource, Action::View, CLAIMS.restricted_scope)
        .await?;
    match state.claims().get(id, user.user_id, decision.scope).await? {
        Some(record) => {
            let flash = take_flash(&state, &user).await;
            Ok(render_view(&record, flash.as_deref()).into_response())
        }
        None => Ok(flash_redirect(&state, &user, "Claim was not found.", "/claims").await),
    }
}

async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ClaimForm>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, CLAIMS.resource, Action::Create, CLAIMS.restricted_scope)
        .await?;
    let input = form.into_input();
    match state.claims().create(user.user_id, &input).await {
        Ok(_) => Ok(flash_redirect(&state, &user, "Claim submitted.", "/claims").await),
        Err(OpsError::ValidationFailed(errors)) => Ok(invalid_form("/claims/add", errors, &input)),
        Err(err) => Err(err.into()),
    }
}

async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Form(form): Form<ClaimForm>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, CLAIMS.resource, Action::Edit, CLAIMS.restricted_scope)
        .await?;
    if state
        .claims()
        .get(id, user.user_id, decision.scope)
        .await?
        .is_none()
    {
        return Ok(flash_redirect(&state, &user, "Claim was not found.", "/claims").await);
    }
    let input = form.into_input();
    match state.claims().update(id, &input).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Claim updated.", "/claims").await),
        Err(OpsError::ValidationFailed(errors)) => {
            Ok(invalid_form(&format!("/claims/{id}/edit"), errors, &input))
        }
        Err(err) => Err(err.into()),
    }
}

/// Shared guard for approve/reject: Edit capability with scope All.
async fn require_resolver(state: &AppState, user: &CurrentUser) -> Result<(), AppError> {
    let decision = state
        .gate
        .require(user.user_id, CLAIMS.resource, Action::Edit, CLAIMS.restricted_scope)
        .await?;
    if decision.scope != RowScope::All {
        return Err(OpsError::Unauthorized(format!(
            "actor {} may not resolve claims",
            user.user_id
        ))
        .into());
    }
    Ok(())
}

async fn approve(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    require_resolver(&state, &user).await?;
    match state.claims().approve(id, user.user_id).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Claim approved.", "/claims").await),
        Err(OpsError::NotFound(_)) => {
            Ok(flash_redirect(&state, &user, "Claim was not found.", "/claims").await)
        }
        Err(err) => Err(err.into()),
    }
}

async fn reject(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    require_resolver(&state, &user).await?;
    match state.claims().reject(id, user.user_id).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Claim rejected.", "/claims").await),
        Err(OpsError::NotFound(_)) => {
            Ok(flash_redirect(&state, &user, "Claim was not found.", "/claims").await)
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
        .require(user.user_id, CLAIMS.resource, Action::Delete, CLAIMS.restricted_scope)
        .await?;
    match state.claims().delete(id).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Claim deleted.", "/claims").await),
        Err(OpsError::NotFound(_)) => {
            Ok(flash_redirect(&state, &user, "Claim was not found.", "/claims").await)
        }
        Err(err) => Err(err.into()),
    }
}

async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, CLAIMS.resource, Action::Export, CLAIMS.restricted_scope)
        .await?;
    let decision = state
        .gate
        .require(user.user_id, CLAIMS.resource, Action::View, CLAIMS.restricted_scope)
        .await?;
    let (header, rows) = state
        .claims()
        .export_rows(user.user_id, decision.scope, &filters_from(&params))
        .await?;
    let bytes = opsdesk_postgres::export::csv_bytes(&header, &rows)?;
    Ok(csv_response("claims.csv", bytes))
}
