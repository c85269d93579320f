//! Payment routes. Receipts are capped at 5 MB.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Extension;
use axum::Router;

use opsdesk_core::{Action, CurrentUser, OpsError, RowScope, UploadPolicy};
use opsdesk_postgres::payments::{self, PaymentFilters, PaymentInput, PaymentRecord};
use opsdesk_postgres::PAYMENTS;

use crate::error::AppError;
use crate::html;
use crate::routes::{csv_response, flash_redirect, forms, take_flash};
use crate::state::AppState;
use crate::uploads::UploadedFile;

const RECEIPT_CAP: u64 = 5 * 1024 * 1024;
const RECEIPT_SUBDIR: &str = "payments_attachments";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", get(index))
        .route("/payments/my", get(my))
        .route("/payments/export", get(export))
        .route("/payments/add", post(add))
        .route("/payments/:id", get(view))
        .route("/payments/:id/edit", post(edit))
        .route("/payments/:id/delete", post(delete))
}

fn filters_from(params: &forms::ListParams) -> PaymentFilters {
    PaymentFilters {
        q: forms::non_empty(params.q.as_deref()),
        from: forms::parse_date(params.from.as_deref()),
        to: forms::parse_date(params.to.as_deref()),
        method: forms::non_empty(params.method.as_deref()),
    }
}

fn input_from(values: &HashMap<String, String>) -> PaymentInput {
    let get = |key: &str| values.get(key).map(String::as_str);
    PaymentInput {
        invoice_no: forms::non_empty(get("invoice_no")).unwrap_or_default(),
        amount: forms::parse_decimal(get("amount")),
        paid_on: forms::parse_date(get("paid_on")),
        method: forms::non_empty(get("method")).unwrap_or_default(),
        payer_name: forms::non_empty(get("payer_name")),
        reference_no: forms::non_empty(get("reference_no")),
        lead_id: forms::parse_i64(get("lead_id")),
        notes: forms::non_empty(get("notes")),
    }
}

fn validation_errors(input: &PaymentInput, file: Option<&UploadedFile>) -> Vec<String> {
    let mut errors = payments::validate(input, chrono::Local::now().date_naive());
    if let Some(file) = file.filter(|f| !f.is_empty()) {
        if let Err(file_errors) = UploadPolicy::attachment(RECEIPT_CAP)
            .validate(&file.original_name, file.bytes.len() as u64)
        {
            errors.extend(file_errors);
        }
    }
    errors
}

fn invalid_form(action: &str, errors: Vec<String>, input: &PaymentInput) -> Response {
    let fields = vec![
        ("invoice_no", input.invoice_no.clone()),
        (
            "amount",
            input.amount.map(|a| a.to_string()).unwrap_or_default(),
        ),
        (
            "paid_on",
            input.paid_on.map(|d| d.to_string()).unwrap_or_default(),
        ),
        ("method", input.method.clone()),
        ("payer_name", input.payer_name.clone().unwrap_or_default()),
        (
            "reference_no",
            input.reference_no.clone().unwrap_or_default(),
        ),
        ("notes", input.notes.clone().unwrap_or_default()),
    ];
    (
        axum::http::StatusCode::UNPROCESSABLE_ENTITY,
        Html(html::form_page("Payment", action, &errors, &fields)),
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
        .payments()
        .list(user.user_id, scope, &filters_from(params))
        .await?;
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.invoice_no.clone(),
                r.amount.to_string(),
                r.paid_on.to_string(),
                r.method.clone(),
            ]
        })
        .collect();
    let flash = take_flash(state, user).await;
    let body = html::table(&["id", "invoice_no", "amount", "paid_on", "method"], &rows);
    Ok(Html(html::page(title, flash.as_deref(), &body)).into_response())
}

async fn index(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, PAYMENTS.resource, Action::View, PAYMENTS.restricted_scope)
        .await?;
    render_list(&state, &user, decision.scope, &params, "Payments").await
}

async fn my(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<forms::ListParams>,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, PAYMENTS.resource, Action::View, PAYMENTS.restricted_scope)
        .await?;
    render_list(&state, &user, RowScope::Assigned, &params, "My payments").await
}

fn render_view(record: &PaymentRecord, flash: Option<&str>) -> Html<String> {
    let mut pairs = vec![
        ("Invoice", record.invoice_no.clone(), false),
        ("Amount", record.amount.to_string(), false),
        ("Paid on", record.paid_on.to_string(), false),
        ("Method", record.method.clone(), false),
        (
            "Payer",
            record.payer_name.clone().unwrap_or_default(),
            false,
        ),
        ("Notes", record.notes.clone().unwrap_or_default(), false),
    ];
    if let Some(reference) = &record.reference_no {
        pairs.push(("Reference", reference.clone(), false));
    }
    if let Some(path) = &record.receipt_path {
        pairs.push(("Receipt", path.clone(), false));
    }
    Html(html::page("Payment", flash, &html::detail_rows(&pairs)))
}

async fn view(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, PAYMENTS.resource, Action::View, PAYMENTS.restricted_scope)
        .await?;
    match state.payments().get(id, user.user_id, decision.scope).await? {
        Some(record) => {
            let flash = take_flash(&state, &user).await;
            Ok(render_view(&record, flash.as_deref()).into_response())
        }
        None => Ok(flash_redirect(&state, &user, "Payment was not found.", "/payments").await),
    }
}

async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    state
        .gate
        .require(user.user_id, PAYMENTS.resource, Action::Create, PAYMENTS.restricted_scope)
        .await?;
    let (values, file) = forms::collect_multipart(multipart).await?;
    let input = input_from(&values);
    let errors = validation_errors(&input, file.as_ref());
    if !errors.is_empty() {
        return Ok(invalid_form("/payments/add", errors, &input));
    }
    let receipt_path = match &file {
        Some(file) => {
            state
                .attachments
                .store(
                    file,
                    &UploadPolicy::attachment(RECEIPT_CAP),
                    RECEIPT_SUBDIR,
                    "payment",
                )
                .await?
        }
        None => None,
    };
    state
        .payments()
        .create(user.user_id, &input, receipt_path)
        .await?;
    Ok(flash_redirect(&state, &user, "Payment saved.", "/payments").await)
}

async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let decision = state
        .gate
        .require(user.user_id, PAYMENTS.resource, Action::Edit, PAYMENTS.restricted_scope)
        .await?;
    let existing = match state.payments().get(id, user.user_id, decision.scope).await? {
        Some(record) => record,
        None => {
            return Ok(flash_redirect(&state, &user, "Payment was not found.", "/payments").await)
        }
    };

    let (values, file) = forms::collect_multipart(multipart).await?;
    let input = input_from(&values);
    let errors = validation_errors(&input, file.as_ref());
    if !errors.is_empty() {
        return Ok(invalid_form(&format!("/payments/{id}/edit"), errors, &input));
    }

    let new_path = match &file {
        Some(file) => {
            state
                .attachments
                .store(
                    file,
                    &UploadPolicy::attachment(RECEIPT_CAP),
                    RECEIPT_SUBDIR,
                    "payment",
                )
                .await?
        }
        None => None,
    };
    match state.payments().update(id, &input, new_path.clone()).await {
        Ok(()) => {
            if let (Some(_), Some(old)) = (&new_path, &existing.receipt_path) {
                state.attachments.remove_quiet(old).await;
            }
            Ok(flash_redirect(&state, &user, "Payment updated.", "/payments").await)
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
        .require(user.user_id, PAYMENTS.resource, Action::Delete, PAYMENTS.restricted_scope)
        .await?;
    match state.payments().delete(id).await {
        Ok(()) => Ok(flash_redirect(&state, &user, "Payment deleted.", "/payments").await),
        Err(OpsError::NotFound(_)) => {
            Ok(flash_redirect(&state, &user, "Payment was not found.", "/payments").await)
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
        .require(user.user_id, PAYMENTS.resource, Action::Export, PAYMENTS.restricted_scope)
        .await?;
    let decision = state
        .gate
        .require(user.user_id, PAYMENTS.resource, Action::View, PAYMENTS.restricted_scope)
        .await?;
    let (header, rows) = state
        .payments()
        .export_rows(user.user_id, decision.scope, &filters_from(&params))
        .await?;
    let bytes = opsdesk_postgres::export::csv_bytes(&header, &rows)?;
    Ok(csv_response("payments.csv", bytes))
}
