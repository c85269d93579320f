//! Call routes: index/my/view/add/edit/delete/export.
//!
//! This module is the fully-worked shape the other record routes follow:
//! gate first, then the adaptive service, then minimal HTML or a redirect.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Extension;
use axum::Router;
use chrono::Local;

use opsdesk_core::{Action, CurrentUser, OpsError, RowScope, UploadPolicy};
use opsdesk_postgres::calls::{self, CallFilters, CallInput, CallRecord};
use opsdesk_postgres::CALLS;

use crate::error::AppError;
use crate::html;
use crate::routes::{csv_response, flash_redirect, forms, take_flash};
use crate::state::AppState;
use crate::uploads::UploadedFile;

const ATTACHMENT_CAP: u64 = 3 * 1024 * 1024;
const ATTACHMENT_SUBDIR: &str = "calls_attachments";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/calls", get(index))
        .route("/calls/my", get(my))
        .route("/calls/export", get(export))
        .route("/calls/add", post(add))
        .route("/calls/:id", get(view))
        .route("/calls/:id/edit", post(edit))
        .route("/calls/:id/delete", post(delete))
}

fn filters_from(params: &forms::ListParams) -> CallFilters {
    CallFilters {
        q: forms::non_empty(params.q.as_deref()),
        from: forms::parse_date(params.from.as_deref()),
        to: forms::parse_date(params.to.as_deref()),
        assigned_to: forms::parse_i64(params.assigned_to.as_deref()),
        outcome: forms::non_empty(params.outcome.as_deref()),
    }
}

fn input_from(values: &HashMap<String, String>) -> CallInput {
    let get = |key: &str| values.get(key).map(String::as_str);
    CallInput {
        title: forms::non_empty(get("title")).unwrap_or_default(),
        call_date: forms::parse_date(get("call_date")),
        outcome: forms::non_empty(get("outcome")).unwrap_or_default(),
        assigned_to: forms::parse_i64(get("assigned_to")),
        notes: forms::non_empty(get("notes")),
        follow_up_date: forms::parse_date(get("follow_up_date")),
        follow_up_type: forms::non_empty(get("follow_up_type")),
        lead_id: forms::parse_i64(get("lead_id")),
    }
}

/// Accumulated form plus file validation. The file policy is checked here,
/// before anything is written, so a rejected submission never touches disk.
fn validation_errors(input: &CallInput, file: Option<&UploadedFile>) -> Vec<String> {
    let mut errors = calls::validate(input, Local::now().date_naive());
    if let Some(file) = file.filter(|f| !f.is_empty()) {
        if let Err(file_errors) =
            UploadPolicy::attachment(ATTACHMENT_CAP).validate(&file.original_name, file.bytes.len() as u64)
        {
            errors.extend(file_errors);
        }
    }
    errors
}

fn form_fields(input: &CallInput) -> Vec<(&'static str, String)> {
    vec![
        ("title", input.title.clone()),
        (
            "call_date",
            input.call_date.map(|d| d.to_string()).unwrap_or_default(),
        ),
        ("outcome", input.outcome.clone()),
        (
            "assigned_to",
            input.assigned_to.map(|v| v.to_string()).unwrap_or_default(),
        ),
        ("notes", input.notes.clone().unwrap_or_default()),
        (
            "follow_up_date",
            input
                .follow_up_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
        ),
        (
            "follow_up_type",
            input.follow_up_type.clone().unwrap_or_default(),
        ),
    ]
}

fn invalid_form(action: &str, errors: Vec<String>, input: &CallInput) -> Response {
    (
        axum::http::StatusCode::UNPROCESSABLE_ENTITY,
        Html(html::form_page("Call", action, &errors, &form_fields(input))),
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
        .calls()
        .list(user.user_id, scope, &filters_from(params))
        .await?;
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.title.clone(),
                r.call_date.to_string(),
                r.outcome.clone(),
            ]
        })
        .collect();
    let flash = take_flash(state, user).await;
    let body = html::table(&["id", "title", "call_date", "outcome"], &rows);
    Ok(Html(html::page(title, flash.as_deref(), &body)).into_response())
}

async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, CALLS.resource, Action::View, CALLS.restricted_scope)
        .await?;
    render_list(&state, &user, decision.scope, &params, "Calls").await
}

async fn my(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, CALLS.resource, Action::View, CALLS.restricted_scope)
        .await?;
    render_list(&state, &user, RowScope::Assigned, &params, "My calls").await
}

fn render_view(record: &CallRecord, flash: Option<&str>) -> Html<String> {
    let mut pairs = vec![
        ("Title", record.title.clone(), false),
        ("Call date", record.call_date.to_string(), false),
        ("Outcome", html::badge(&record.outcome), true),
        (
            "Assigned to",
            record.assigned_to.map(|v| v.to_string()).unwrap_or_default(),
            false,
        ),
        ("Notes", record.notes.clone().unwrap_or_default(), false),
    ];
    if let Some(follow_up) = record.follow_up_date {
        pairs.push(("Follow-up", follow_up.to_string(), false));
    }
    if let Some(path) = &record.attachment_path {
        pairs.push(("Attachment", path.clone(), false));
    }
    Html(html::page("Call", flash, &html::detail_rows(&pairs)))
}

async fn view(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, CALLS.resource, Action::View, CALLS.restricted_scope)
        .await?;
    match state.calls().get(id, user.user_id, decision.scope).await? {
        Some(record) => {
            let flash = take_flash(&state, &user).await;
            Ok(render_view(&record, flash.as_deref()).into_response())
        }
        None => Ok(flash_redirect(&state, &user, "Call was not found.", "/calls").await),
    }
}

async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, CALLS.resource, Action::Create, CALLS.restricted_scope)
        .await?;
    let (values, file) = forms::collect_multipart(multipart).await?;
    let input = input_from(&values);

    let errors = validation_errors(&input, file.as_ref());
    if !errors.is_empty() {
        return Ok(invalid_form("/calls/add", errors, &input));
    }

    let attachment_path = match &file {
        Some(file) => {
            state
                .attachments
                .store(
                    file,
                    &UploadPolicy::attachment(ATTACHMENT_CAP),
                    ATTACHMENT_SUBDIR,
                    "call",
                )
                .await?
        }
        None => None,
    };
    state.calls().create(user.user_id, &input, attachment_path).await?;
    Ok(flash_redirect(&state, &user, "Call saved.", "/calls").await)
}

async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, CALLS.resource, Action::Edit, CALLS.restricted_scope)
        .await?;
    let existing = match state.calls().get(id, user.user_id, decision.scope).await? {
        Some(record) => record,
        None => return Ok(flash_redirect(&state, &user, "Call was not found.", "/calls").await),
    };

    let (values, file) = forms::collect_multipart(multipart).await?;
    let input = input_from(&values);
    let errors = validation_errors(&input, file.as_ref());
    if !errors.is_empty() {
        return Ok(invalid_form(&format!("/calls/{id}/edit"), errors, &input));
    }

    // Replacement order matters: store the new file, update the record,
    // only then delete the old file.
    let new_path = match &file {
        Some(file) => {
            state
                .attachments
                .store(
                    file,
                    &UploadPolicy::attachment(ATTACHMENT_CAP),
                    ATTACHMENT_SUBDIR,
                    "call",
                )
                .await?
        }
        None => None,
    };
    match state.calls().update(id, &input, new_path.clone()).await {
        Ok(()) => {
            if let (Some(_), Some(old)) = (&new_path, &existing.attachment_path) {
                state.attachments.remove_quiet(old).await;
            }
            Ok(flash_redirect(&state, &user, "Call updated.", "/calls").await)
        }
        Err(err) => {
            // The record still points at the old file; clean up the new one.
            if let Some(path) = &new_path {
                state.attachments.remove_quiet(path).await;
            }
            Err(err.into())
        }
    }
}

async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, CALLS.resource, Action::Delete, CALLS.restricted_scope)
        .await?;
    match state.calls().delete(id).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Call deleted.", "/calls").await),
        Err(OpsError::NotFound(_)) => {
            Ok(flash_redirect(&state, &user, "Call was not found.", "/calls").await)
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
        .require(user.user_id, CALLS.resource, Action::Export, CALLS.restricted_scope)
        .await?;
    // Export respects the view scope, not a separate export scope.
    let decision = state
        .gate
        .require(user.user_id, CALLS.resource, Action::View, CALLS.restricted_scope)
        .await?;
    let (header, rows) = state
        .calls()
        .export_rows(user.user_id, decision.scope, &filters_from(&params))
        .await?;
    let bytes = opsdesk_postgres::export::csv_bytes(&header, &rows)?;
    Ok(csv_response("calls.csv", bytes))
}
