//! CRM call logging: outcomes, follow-ups, optional attachment.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::PgPool;

use opsdesk_core::{
    build_insert, build_update, ListQuery, OpsError, Projection, RecordFields,
    ResolvedProjection, Result, RowScope, SchemaRegistry, TableSpec,
};

use crate::exec;

pub const CALLS: TableSpec = TableSpec {
    table: "calls",
    resource: "calls",
    base_columns: &[
        "id",
        "title",
        "call_date",
        "outcome",
        "assigned_to",
        "notes",
        "created_by",
        "created_at",
        "updated_at",
    ],
    optional_columns: &[
        "follow_up_date",
        "follow_up_type",
        "lead_id",
        "attachment_path",
        "deleted_at",
    ],
    text_search_columns: &["title", "notes"],
    owner_column: "created_by",
    assignee_column: Some("assigned_to"),
    restricted_scope: RowScope::Own,
};

pub const CALL_OUTCOMES: [&str; 5] = [
    "Interested",
    "Not Interested",
    "Follow-up Required",
    "No Answer",
    "Callback Requested",
];

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub id: i64,
    pub title: String,
    pub call_date: NaiveDate,
    pub outcome: String,
    pub assigned_to: Option<i64>,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_type: Option<String>,
    pub lead_id: Option<i64>,
    pub attachment_path: Option<String>,
}

/// Submitted form values. Optional-column fields that the deployment lacks
/// are dropped by the mutation builder, not here.
#[derive(Debug, Clone, Default)]
pub struct CallInput {
    pub title: String,
    pub call_date: Option<NaiveDate>,
    pub outcome: String,
    pub assigned_to: Option<i64>,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_type: Option<String>,
    pub lead_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CallFilters {
    pub q: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub assigned_to: Option<i64>,
    pub outcome: Option<String>,
}

/// Field validation, accumulated so the form can show every problem at once.
pub fn validate(input: &CallInput, today: NaiveDate) -> Vec<String> {
    let mut errors = Vec::new();
    if input.title.trim().is_empty() {
        errors.push("Title is required.".to_string());
    }
    match input.call_date {
        None => errors.push("Call date is required.".to_string()),
        Some(date) if date > today => {
            errors.push("Call date cannot be in the future.".to_string());
        }
        Some(date) => {
            if let Some(follow_up) = input.follow_up_date {
                if follow_up < date {
                    errors.push("Follow-up date cannot be before the call date.".to_string());
                }
            }
        }
    }
    if !CALL_OUTCOMES.contains(&input.outcome.as_str()) {
        errors.push("Outcome must be one of the listed options.".to_string());
    }
    errors
}

pub struct CallsService {
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
}

impl CallsService {
    pub fn new(pool: PgPool, registry: Arc<SchemaRegistry>) -> Self {
        Self { pool, registry }
    }

    fn projection(&self) -> ResolvedProjection {
        Projection::for_spec(&CALLS).resolve(&self.registry, CALLS.table)
    }

    fn fields_from(input: &CallInput) -> RecordFields {
        RecordFields::new()
            .set("title", input.title.trim())
            .set("call_date", input.call_date)
            .set("outcome", input.outcome.as_str())
            .set("assigned_to", input.assigned_to)
            .set("notes", input.notes.clone())
            .set("follow_up_date", input.follow_up_date)
            .set("follow_up_type", input.follow_up_type.clone())
            .set("lead_id", input.lead_id)
    }

    pub async fn create(
        &self,
        actor_id: i64,
        input: &CallInput,
        attachment_path: Option<String>,
    ) -> Result<i64> {
        let errors = validate(input, Local::now().date_naive());
        if !errors.is_empty() {
            return Err(OpsError::ValidationFailed(errors));
        }
        let now = Utc::now();
        let fields = Self::fields_from(input)
            .set("created_by", actor_id)
            .set("created_at", now)
            .set("updated_at", now)
            .set_if_some("attachment_path", attachment_path);
        let stmt = build_insert(CALLS.table, fields, &self.registry, Some("id"))?;
        exec::insert_returning_id(&self.pool, stmt, "creating call").await
    }

    /// Update the submitted fields. `attachment_path` of `None` leaves the
    /// stored attachment untouched; replacement is the caller's flow.
    pub async fn update(
        &self,
        id: i64,
        input: &CallInput,
        attachment_path: Option<String>,
    ) -> Result<()> {
        let errors = validate(input, Local::now().date_naive());
        if !errors.is_empty() {
            return Err(OpsError::ValidationFailed(errors));
        }
        let fields = Self::fields_from(input)
            .set("updated_at", Utc::now())
            .set_if_some("attachment_path", attachment_path);
        let stmt = build_update(CALLS.table, fields, &self.registry, "id", id)?;
        exec::execute_required(&self.pool, stmt, "Call", "updating call").await
    }

    pub async fn get(&self, id: i64, actor_id: i64, scope: RowScope) -> Result<Option<CallRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(CALLS.table, &self.registry)
            .equals("id", id)
            .assemble(scope, &CALLS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection.column_list(),
            CALLS.table,
            wc.sql
        );
        let row = exec::fetch_optional(&self.pool, &sql, wc.bindings, "loading call").await?;
        row.map(|r| row_to_record(&r, &projection)).transpose()
    }

    pub async fn list(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &CallFilters,
    ) -> Result<Vec<CallRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(CALLS.table, &self.registry)
            .maybe_equals("outcome", filters.outcome.as_deref())
            .maybe_equals("assigned_to", filters.assigned_to)
            .date_from("call_date", filters.from)
            .date_to("call_date", filters.to)
            .search(filters.q.as_deref(), CALLS.text_search_columns)
            .assemble(scope, &CALLS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY call_date DESC, id DESC",
            projection.column_list(),
            CALLS.table,
            wc.sql
        );
        let rows = exec::fetch_all(&self.pool, &sql, wc.bindings, "listing calls").await?;
        rows.iter().map(|r| row_to_record(r, &projection)).collect()
    }

    /// Soft delete when the deployment has `deleted_at`, hard delete
    /// otherwise.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let affected = if self.registry.has_column(CALLS.table, "deleted_at") {
            exec::execute(
                &self.pool,
                "UPDATE calls SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
                vec![id.into()],
                "deleting call",
            )
            .await?
        } else {
            exec::execute(
                &self.pool,
                "DELETE FROM calls WHERE id = $1",
                vec![id.into()],
                "deleting call",
            )
            .await?
        };
        if affected == 0 {
            return Err(OpsError::NotFound("Call".to_string()));
        }
        Ok(())
    }

    /// Header plus stringified rows for the CSV export, shaped by the same
    /// projection and scope as the list page.
    pub async fn export_rows(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &CallFilters,
    ) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let projection = self.projection();
        let records = self.list(actor_id, scope, filters).await?;
        let header: Vec<String> = projection.columns().iter().map(|c| c.to_string()).collect();
        let rows = records
            .iter()
            .map(|record| {
                projection
                    .columns()
                    .iter()
                    .map(|column| export_cell(record, column))
                    .collect()
            })
            .collect();
        Ok((header, rows))
    }
}

fn row_to_record(row: &PgRow, projection: &ResolvedProjection) -> Result<CallRecord> {
    let ctx = "reading call row";
    let mut record = CallRecord {
        id: exec::col(row, "id", ctx)?,
        title: exec::col(row, "title", ctx)?,
        call_date: exec::col(row, "call_date", ctx)?,
        outcome: exec::col(row, "outcome", ctx)?,
        assigned_to: exec::col(row, "assigned_to", ctx)?,
        notes: exec::col(row, "notes", ctx)?,
        created_by: exec::col(row, "created_by", ctx)?,
        created_at: exec::col(row, "created_at", ctx)?,
        updated_at: exec::col(row, "updated_at", ctx)?,
        follow_up_date: None,
        follow_up_type: None,
        lead_id: None,
        attachment_path: None,
    };
    if projection.contains("follow_up_date") {
        record.follow_up_date = exec::col(row, "follow_up_date", ctx)?;
    }
    if projection.contains("follow_up_type") {
        record.follow_up_type = exec::col(row, "follow_up_type", ctx)?;
    }
    if projection.contains("lead_id") {
        record.lead_id = exec::col(row, "lead_id", ctx)?;
    }
    if projection.contains("attachment_path") {
        record.attachment_path = exec::col(row, "attachment_path", ctx)?;
    }
    Ok(record)
}

fn export_cell(record: &CallRecord, column: &str) -> String {
    match column {
        "id" => record.id.to_string(),
        "title" => record.title.clone(),
        "call_date" => record.call_date.to_string(),
        "outcome" => record.outcome.clone(),
        "assigned_to" => record.assigned_to.map(|v| v.to_string()).unwrap_or_default(),
        "notes" => record.notes.clone().unwrap_or_default(),
        "created_by" => record.created_by.to_string(),
        "created_at" => record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "updated_at" => record.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "follow_up_date" => record
            .follow_up_date
            .map(|d| d.to_string())
            .unwrap_or_default(),
        "follow_up_type" => record.follow_up_type.clone().unwrap_or_default(),
        "lead_id" => record.lead_id.map(|v| v.to_string()).unwrap_or_default(),
        "attachment_path" => record.attachment_path.clone().unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> CallInput {
        CallInput {
            title: "Quote follow-up".to_string(),
            call_date: NaiveDate::from_ymd_opt(2026, 8, 20),
            outcome: "Interested".to_string(),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 22).unwrap()
    }

    #[test]
    fn valid_input_passes() {
        assert!(validate(&base_input(), today()).is_empty());
    }

    #[test]
    fn future_call_date_is_rejected_with_the_exact_message() {
        let mut input = base_input();
        input.call_date = NaiveDate::from_ymd_opt(2026, 8, 23);
        let errors = validate(&input, today());
        assert_eq!(errors, vec!["Call date cannot be in the future.".to_string()]);
    }

    #[test]
    fn todays_date_is_allowed() {
        let mut input = base_input();
        input.call_date = Some(today());
        assert!(validate(&input, today()).is_empty());
    }

    #[test]
    fn blank_title_and_missing_date_accumulate() {
        let input = CallInput {
            title: "   ".to_string(),
            call_date: None,
            outcome: "Interested".to_string(),
            ..Default::default()
        };
        let errors = validate(&input, today());
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Title"));
        assert!(errors[1].contains("Call date is required"));
    }

    #[test]
    fn unknown_outcome_is_rejected() {
        let mut input = base_input();
        input.outcome = "Maybe".to_string();
        let errors = validate(&input, today());
        assert_eq!(errors, vec!["Outcome must be one of the listed options.".to_string()]);
    }

    #[test]
    fn follow_up_before_call_date_is_rejected() {
        let mut input = base_input();
        input.follow_up_date = NaiveDate::from_ymd_opt(2026, 8, 19);
        let errors = validate(&input, today());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Follow-up date"));
    }

    #[test]
    fn export_cell_blanks_absent_optionals() {
        let record = CallRecord {
            id: 3,
            title: "Roof quote".to_string(),
            call_date: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
            outcome: "Interested".to_string(),
            assigned_to: None,
            notes: None,
            created_by: 7,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            follow_up_date: None,
            follow_up_type: None,
            lead_id: None,
            attachment_path: None,
        };
        assert_eq!(export_cell(&record, "id"), "3");
        assert_eq!(export_cell(&record, "call_date"), "2026-08-20");
        assert_eq!(export_cell(&record, "assigned_to"), "");
        assert_eq!(export_cell(&record, "follow_up_type"), "");
    }
}
