//! Work order routes. Plain form posts, no attachments; the restricted
//! scope is Assigned, so `view-own` shows a technician the orders routed to
//! them.

use axum::extract::{Form, Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Extension;
use axum::Router;
use serde::Deserialize;

use opsdesk_core::{Action, CurrentUser, OpsError, RowScope};
use opsdesk_postgres::work_orders::{WorkOrderFilters, WorkOrderInput, WorkOrderRecord};
use opsdesk_postgres::WORK_ORDERS;

use crate::error::AppError;
use crate::html;
use crate::routes::{csv_response, flash_redirect, forms, take_flash};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/work-orders", get(index))
        .route("/work-orders/my", get(my))
        .route("/work-orders/export", get(export))
        .route("/work-orders/add", post(add))
        .route("/work-orders/:id", get(view))
        .route("/work-orders/:id/edit", post(edit))
        .route("/work-orders/:id/delete", post(delete))
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkOrderForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<String>,
    pub client_name: Option<String>,
}

impl WorkOrderForm {
    fn into_input(self) -> WorkOrderInput {
        WorkOrderInput {
            title: forms::non_empty(self.title.as_deref()).unwrap_or_default(),
            description: forms::non_empty(self.description.as_deref()),
            status: forms::non_empty(self.status.as_deref()).unwrap_or_default(),
            priority: forms::non_empty(self.priority.as_deref()).unwrap_or_default(),
            assigned_to: forms::parse_i64(self.assigned_to.as_deref()),
            due_date: forms::parse_date(self.due_date.as_deref()),
            client_name: forms::non_empty(self.client_name.as_deref()),
        }
    }
}

fn filters_from(params: &forms::ListParams) -> WorkOrderFilters {
    WorkOrderFilters {
        q: forms::non_empty(params.q.as_deref()),
        from: forms::parse_date(params.from.as_deref()),
        to: forms::parse_date(params.to.as_deref()),
        assigned_to: forms::parse_i64(params.assigned_to.as_deref()),
        status: forms::non_empty(params.status.as_deref()),
        priority: forms::non_empty(params.priority.as_deref()),
    }
}

fn invalid_form(action: &str, errors: Vec<String>, input: &WorkOrderInput) -> Response {
    let fields = vec![
        ("title", input.title.clone()),
        ("description", input.description.clone().unwrap_or_default()),
        ("status", input.status.clone()),
        ("priority", input.priority.clone()),
        (
            "assigned_to",
            input.assigned_to.map(|v| v.to_string()).unwrap_or_default(),
        ),
        (
            "due_date",
            input.due_date.map(|d| d.to_string()).unwrap_or_default(),
        ),
        ("client_name", input.client_name.clone().unwrap_or_default()),
    ];
    (
        axum::http::StatusCode::UNPROCESSABLE_ENTITY,
        Html(html::form_page("Work order", action, &errors, &fields)),
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
        .work_orders()
        .list(user.user_id, scope, &filters_from(params))
        .await?;
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.title.clone(),
                r.status.clone(),
                r.priority.clone(),
                r.due_date.map(|d| d.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    let flash = take_flash(state, user).await;
    let body = html::table(&["id", "title", "status", "priority", "due_date"], &rows);
    Ok(Html(html::page(title, flash.as_deref(), &body)).into_response())
}

async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(
            user.user_id,
            WORK_ORDERS.resource,
            Action::View,
            WORK_ORDERS.restricted_scope,
        )
        .await?;
    render_list(&state, &user, decision.scope, &params, "Work orders").await
}

async fn my(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(
            user.user_id,
            WORK_ORDERS.resource,
            Action::View,
            WORK_ORDERS.restricted_scope,
        )
        .await?;
    render_list(&state, &user, RowScope::Assigned, &params, "My work orders").await
}

fn render_view(record: &WorkOrderRecord, flash: Option<&str>) -> Html<String> {
    let mut pairs = vec![
        ("Title", record.title.clone(), false),
        (
            "Description",
            record.description.clone().unwrap_or_default(),
            false,
        ),
        ("Status", html::badge(&record.status), true),
        ("Priority", html::badge(&record.priority), true),
        (
            "Assigned to",
            record.assigned_to.map(|v| v.to_string()).unwrap_or_default(),
            false,
        ),
        (
            "Due date",
            record.due_date.map(|d| d.to_string()).unwrap_or_default(),
            false,
        ),
    ];
    if let Some(client) = &record.client_name {
        pairs.push(("Client", client.clone(), false));
    }
    if let Some(completed) = record.completed_at {
        pairs.push((
            "Completed at",
            completed.format("%Y-%m-%d %H:%M").to_string(),
            false,
        ));
    }
    Html(html::page("Work order", flash, &html::detail_rows(&pairs)))
}

async fn view(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(
            user.user_id,
            WORK_ORDERS.resource,
            Action::View,
            WORK_ORDERS.restricted_scope,
        )
        .await?;
    match state
        .work_orders()
        .get(id, user.user_id, decision.scope)
        .await?
    {
        Some(record) => {
            let flash = take_flash(&state, &user).await;
            Ok(render_view(&record, flash.as_deref()).into_response())
        }
        None => {
            Ok(flash_redirect(&state, &user, "Work order was not found.", "/work-orders").await)
        }
    }
}

async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<WorkOrderForm>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(
            user.user_id,
            WORK_ORDERS.resource,
            Action::Create,
            WORK_ORDERS.restricted_scope,
        )
        .await?;
    let input = form.into_input();
    match state.work_orders().create(user.user_id, &input).await {
        Ok(_) => Ok(flash_redirect(&state, &user, "Work order saved.", "/work-orders").await),
        Err(OpsError::ValidationFailed(errors)) => {
            Ok(invalid_form("/work-orders/add", errors, &input))
        }
        Err(err) => Err(err.into()),
    }
}

async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Form(form): Form<WorkOrderForm>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(
            user.user_id,
            WORK_ORDERS.resource,
            Action::Edit,
            WORK_ORDERS.restricted_scope,
        )
        .await?;
    if state
        .work_orders()
        .get(id, user.user_id, decision.scope)
        .await?
        .is_none()
    {
        return Ok(
            flash_redirect(&state, &user, "Work order was not found.", "/work-orders").await,
        );
    }
    let input = form.into_input();
    match state.work_orders().update(id, &input).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Work order updated.", "/work-orders").await),
        Err(OpsError::ValidationFailed(errors)) => {
            Ok(invalid_form(&format!("/work-orders/{id}/edit"), errors, &input))
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
        .require(
            user.user_id,
            WORK_ORDERS.resource,
            Action::Delete,
            WORK_ORDERS.restricted_scope,
        )
        .await?;
    match state.work_orders().delete(id).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Work order deleted.", "/work-orders").await),
        Err(OpsError::NotFound(_)) => {
            Ok(flash_redirect(&state, &user, "Work order was not found.", "/work-orders").await)
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
        .require(
            user.user_id,
            WORK_ORDERS.resource,
            Action::Export,
            WORK_ORDERS.restricted_scope,
        )
        .await?;
    let decision = state
        .gate
        .require(
            user.user_id,
            WORK_ORDERS.resource,
            Action::View,
            WORK_ORDERS.restricted_scope,
        )
        .await?;
    let (header, rows) = state
        .work_orders()
        .export_rows(user.user_id, decision.scope, &filters_from(&params))
        .await?;
    let bytes = opsdesk_postgres::export::csv_bytes(&header, &rows)?;
    Ok(csv_response("work_orders.csv", bytes))
}
