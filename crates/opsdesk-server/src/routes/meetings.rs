//! Meeting routes. Same shape as the call routes with a 2 MB attachment cap.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Extension;
use axum::Router;

use opsdesk_core::{Action, CurrentUser, OpsError, RowScope, UploadPolicy};
use opsdesk_postgres::meetings::{self, MeetingFilters, MeetingInput, MeetingRecord};
use opsdesk_postgres::MEETINGS;

use crate::error::AppError;
use crate::html;
use crate::routes::{csv_response, flash_redirect, forms, take_flash};
use crate::state::AppState;
use crate::uploads::UploadedFile;

const ATTACHMENT_CAP: u64 = 2 * 1024 * 1024;
const ATTACHMENT_SUBDIR: &str = "meetings_attachments";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meetings", get(index))
        .route("/meetings/my", get(my))
        .route("/meetings/export", get(export))
        .route("/meetings/add", post(add))
        .route("/meetings/:id", get(view))
        .route("/meetings/:id/edit", post(edit))
        .route("/meetings/:id/delete", post(delete))
}

fn filters_from(params: &forms::ListParams) -> MeetingFilters {
    MeetingFilters {
        q: forms::non_empty(params.q.as_deref()),
        from: forms::parse_date(params.from.as_deref()),
        to: forms::parse_date(params.to.as_deref()),
        assigned_to: forms::parse_i64(params.assigned_to.as_deref()),
        outcome: forms::non_empty(params.outcome.as_deref()),
    }
}

fn input_from(values: &HashMap<String, String>) -> MeetingInput {
    let get = |key: &str| values.get(key).map(String::as_str);
    MeetingInput {
        title: forms::non_empty(get("title")).unwrap_or_default(),
        meeting_date: forms::parse_date(get("meeting_date")),
        start_time: forms::non_empty(get("start_time")),
        location: forms::non_empty(get("location")),
        assigned_to: forms::parse_i64(get("assigned_to")),
        notes: forms::non_empty(get("notes")),
        follow_up_date: forms::parse_date(get("follow_up_date")),
        outcome: forms::non_empty(get("outcome")),
        lead_id: forms::parse_i64(get("lead_id")),
    }
}

fn validation_errors(input: &MeetingInput, file: Option<&UploadedFile>) -> Vec<String> {
    let mut errors = meetings::validate(input);
    if let Some(file) = file.filter(|f| !f.is_empty()) {
        if let Err(file_errors) = UploadPolicy::attachment(ATTACHMENT_CAP)
            .validate(&file.original_name, file.bytes.len() as u64)
        {
            errors.extend(file_errors);
        }
    }
    errors
}

fn invalid_form(action: &str, errors: Vec<String>, input: &MeetingInput) -> Response {
    let fields = vec![
        ("title", input.title.clone()),
        (
            "meeting_date",
            input.meeting_date.map(|d| d.to_string()).unwrap_or_default(),
        ),
        ("start_time", input.start_time.clone().unwrap_or_default()),
        ("location", input.location.clone().unwrap_or_default()),
        ("notes", input.notes.clone().unwrap_or_default()),
    ];
    (
        axum::http::StatusCode::UNPROCESSABLE_ENTITY,
        Html(html::form_page("Meeting", action, &errors, &fields)),
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
        .meetings()
        .list(user.user_id, scope, &filters_from(params))
        .await?;
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.title.clone(),
                r.meeting_date.to_string(),
                r.location.clone().unwrap_or_default(),
            ]
        })
        .collect();
    let flash = take_flash(state, user).await;
    let body = html::table(&["id", "title", "meeting_date", "location"], &rows);
    Ok(Html(html::page(title, flash.as_deref(), &body)).into_response())
}

async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, MEETINGS.resource, Action::View, MEETINGS.restricted_scope)
        .await?;
    render_list(&state, &user, decision.scope, &params, "Meetings").await
}

async fn my(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, MEETINGS.resource, Action::View, MEETINGS.restricted_scope)
        .await?;
    render_list(&state, &user, RowScope::Assigned, &params, "My meetings").await
}

fn render_view(record: &MeetingRecord, flash: Option<&str>) -> Html<String> {
    let mut pairs = vec![
        ("Title", record.title.clone(), false),
        ("Meeting date", record.meeting_date.to_string(), false),
        (
            "Start time",
            record.start_time.clone().unwrap_or_default(),
            false,
        ),
        ("Location", record.location.clone().unwrap_or_default(), false),
        ("Notes", record.notes.clone().unwrap_or_default(), false),
    ];
    if let Some(outcome) = &record.outcome {
        pairs.push(("Outcome", html::badge(outcome), true));
    }
    if let Some(path) = &record.attachment_path {
        pairs.push(("Attachment", path.clone(), false));
    }
    Html(html::page("Meeting", flash, &html::detail_rows(&pairs)))
}

async fn view(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, MEETINGS.resource, Action::View, MEETINGS.restricted_scope)
        .await?;
    match state.meetings().get(id, user.user_id, decision.scope).await? {
        Some(record) => {
            let flash = take_flash(&state, &user).await;
            Ok(render_view(&record, flash.as_deref()).into_response())
        }
        None => Ok(flash_redirect(&state, &user, "Meeting was not found.", "/meetings").await),
    }
}

async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, MEETINGS.resource, Action::Create, MEETINGS.restricted_scope)
        .await?;
    let (values, file) = forms::collect_multipart(multipart).await?;
    let input = input_from(&values);
    let errors = validation_errors(&input, file.as_ref());
    if !errors.is_empty() {
        return Ok(invalid_form("/meetings/add", errors, &input));
    }
    let attachment_path = match &file {
        Some(file) => {
            state
                .attachments
                .store(
                    file,
                    &UploadPolicy::attachment(ATTACHMENT_CAP),
                    ATTACHMENT_SUBDIR,
                    "meeting",
                )
                .await?
        }
        None => None,
    };
    state
        .meetings()
        .create(user.user_id, &input, attachment_path)
        .await?;
    Ok(flash_redirect(&state, &user, "Meeting saved.", "/meetings").await)
}

async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, MEETINGS.resource, Action::Edit, MEETINGS.restricted_scope)
        .await?;
    let existing = match state.meetings().get(id, user.user_id, decision.scope).await? {
        Some(record) => record,
        None => {
            return Ok(flash_redirect(&state, &user, "Meeting was not found.", "/meetings").await)
        }
    };

    let (values, file) = forms::collect_multipart(multipart).await?;
    let input = input_from(&values);
    let errors = validation_errors(&input, file.as_ref());
    if !errors.is_empty() {
        return Ok(invalid_form(&format!("/meetings/{id}/edit"), errors, &input));
    }

    let new_path = match &file {
        Some(file) => {
            state
                .attachments
                .store(
                    file,
                    &UploadPolicy::attachment(ATTACHMENT_CAP),
                    ATTACHMENT_SUBDIR,
                    "meeting",
                )
                .await?
        }
        None => None,
    };
    match state.meetings().update(id, &input, new_path.clone()).await {
        Ok(()) => {
            if let (Some(_), Some(old)) = (&new_path, &existing.attachment_path) {
                state.attachments.remove_quiet(old).await;
            }
            Ok(flash_redirect(&state, &user, "Meeting updated.", "/meetings").await)
        }
        Err(err) => {
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
        .require(user.user_id, MEETINGS.resource, Action::Delete, MEETINGS.restricted_scope)
        .await?;
    match state.meetings().delete(id).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Meeting deleted.", "/meetings").await),
        Err(OpsError::NotFound(_)) => {
            Ok(flash_redirect(&state, &user, "Meeting was not found.", "/meetings").await)
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
        .require(user.user_id, MEETINGS.resource, Action::Export, MEETINGS.restricted_scope)
        .await?;
    let decision = state
        .gate
        .require(user.user_id, MEETINGS.resource, Action::View, MEETINGS.restricted_scope)
        .await?;
    let (header, rows) = state
        .meetings()
        .export_rows(user.user_id, decision.scope, &filters_from(&params))
        .await?;
    let bytes = opsdesk_postgres::export::csv_bytes(&header, &rows)?;
    Ok(csv_response("meetings.csv", bytes))
}
