//! CRM meetings: scheduling, outcomes after the fact, optional attachment.
//!
//! Unlike calls, a meeting date may lie in the future; that is the normal
//! case for scheduling.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::PgPool;

use opsdesk_core::{
    build_insert, build_update, ListQuery, OpsError, Projection, RecordFields,
    ResolvedProjection, Result, RowScope, SchemaRegistry, TableSpec,
};

use crate::exec;

pub const MEETINGS: TableSpec = TableSpec {
    table: "meetings",
    resource: "meetings",
    base_columns: &[
        "id",
        "title",
        "meeting_date",
        "start_time",
        "location",
        "assigned_to",
        "notes",
        "created_by",
        "created_at",
        "updated_at",
    ],
    optional_columns: &[
        "follow_up_date",
        "outcome",
        "lead_id",
        "attachment_path",
        "deleted_at",
    ],
    text_search_columns: &["title", "location", "notes"],
    owner_column: "created_by",
    assignee_column: Some("assigned_to"),
    restricted_scope: RowScope::Own,
};

#[derive(Debug, Clone)]
pub struct MeetingRecord {
    pub id: i64,
    pub title: String,
    pub meeting_date: NaiveDate,
    pub start_time: Option<String>,
    pub location: Option<String>,
    pub assigned_to: Option<i64>,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub follow_up_date: Option<NaiveDate>,
    pub outcome: Option<String>,
    pub lead_id: Option<i64>,
    pub attachment_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MeetingInput {
    pub title: String,
    pub meeting_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub location: Option<String>,
    pub assigned_to: Option<i64>,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub outcome: Option<String>,
    pub lead_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct MeetingFilters {
    pub q: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub assigned_to: Option<i64>,
    pub outcome: Option<String>,
}

pub fn validate(input: &MeetingInput) -> Vec<String> {
    let mut errors = Vec::new();
    if input.title.trim().is_empty() {
        errors.push("Title is required.".to_string());
    }
    if input.meeting_date.is_none() {
        errors.push("Meeting date is required.".to_string());
    }
    errors
}

pub struct MeetingsService {
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
}

impl MeetingsService {
    pub fn new(pool: PgPool, registry: Arc<SchemaRegistry>) -> Self {
        Self { pool, registry }
    }

    fn projection(&self) -> ResolvedProjection {
        Projection::for_spec(&MEETINGS).resolve(&self.registry, MEETINGS.table)
    }

    fn fields_from(input: &MeetingInput) -> RecordFields {
        RecordFields::new()
            .set("title", input.title.trim())
            .set("meeting_date", input.meeting_date)
            .set("start_time", input.start_time.clone())
            .set("location", input.location.clone())
            .set("assigned_to", input.assigned_to)
            .set("notes", input.notes.clone())
            .set("follow_up_date", input.follow_up_date)
            .set("outcome", input.outcome.clone())
            .set("lead_id", input.lead_id)
    }

    pub async fn create(
        &self,
        actor_id: i64,
        input: &MeetingInput,
        attachment_path: Option<String>,
    ) -> Result<i64> {
        let errors = validate(input);
        if !errors.is_empty() {
            return Err(OpsError::ValidationFailed(errors));
        }
        let now = Utc::now();
        let fields = Self::fields_from(input)
            .set("created_by", actor_id)
            .set("created_at", now)
            .set("updated_at", now)
            .set_if_some("attachment_path", attachment_path);
        let stmt = build_insert(MEETINGS.table, fields, &self.registry, Some("id"))?;
        exec::insert_returning_id(&self.pool, stmt, "creating meeting").await
    }

    pub async fn update(
        &self,
        id: i64,
        input: &MeetingInput,
        attachment_path: Option<String>,
    ) -> Result<()> {
        let errors = validate(input);
        if !errors.is_empty() {
            return Err(OpsError::ValidationFailed(errors));
        }
        let fields = Self::fields_from(input)
            .set("updated_at", Utc::now())
            .set_if_some("attachment_path", attachment_path);
        let stmt = build_update(MEETINGS.table, fields, &self.registry, "id", id)?;
        exec::execute_required(&self.pool, stmt, "Meeting", "updating meeting").await
    }

    pub async fn get(
        &self,
        id: i64,
        actor_id: i64,
        scope: RowScope,
    ) -> Result<Option<MeetingRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(MEETINGS.table, &self.registry)
            .equals("id", id)
            .assemble(scope, &MEETINGS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection.column_list(),
            MEETINGS.table,
            wc.sql
        );
        let row = exec::fetch_optional(&self.pool, &sql, wc.bindings, "loading meeting").await?;
        row.map(|r| row_to_record(&r, &projection)).transpose()
    }

    pub async fn list(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &MeetingFilters,
    ) -> Result<Vec<MeetingRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(MEETINGS.table, &self.registry)
            .maybe_equals("outcome", filters.outcome.as_deref())
            .maybe_equals("assigned_to", filters.assigned_to)
            .date_from("meeting_date", filters.from)
            .date_to("meeting_date", filters.to)
            .search(filters.q.as_deref(), MEETINGS.text_search_columns)
            .assemble(scope, &MEETINGS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY meeting_date DESC, id DESC",
            projection.column_list(),
            MEETINGS.table,
            wc.sql
        );
        let rows = exec::fetch_all(&self.pool, &sql, wc.bindings, "listing meetings").await?;
        rows.iter().map(|r| row_to_record(r, &projection)).collect()
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let affected = if self.registry.has_column(MEETINGS.table, "deleted_at") {
            exec::execute(
                &self.pool,
                "UPDATE meetings SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
                vec![id.into()],
                "deleting meeting",
            )
            .await?
        } else {
            exec::execute(
                &self.pool,
                "DELETE FROM meetings WHERE id = $1",
                vec![id.into()],
                "deleting meeting",
            )
            .await?
        };
        if affected == 0 {
            return Err(OpsError::NotFound("Meeting".to_string()));
        }
        Ok(())
    }

    pub async fn export_rows(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &MeetingFilters,
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

fn row_to_record(row: &PgRow, projection: &ResolvedProjection) -> Result<MeetingRecord> {
    let ctx = "reading meeting row";
    let mut record = MeetingRecord {
        id: exec::col(row, "id", ctx)?,
        title: exec::col(row, "title", ctx)?,
        meeting_date: exec::col(row, "meeting_date", ctx)?,
        start_time: exec::col(row, "start_time", ctx)?,
        location: exec::col(row, "location", ctx)?,
        assigned_to: exec::col(row, "assigned_to", ctx)?,
        notes: exec::col(row, "notes", ctx)?,
        created_by: exec::col(row, "created_by", ctx)?,
        created_at: exec::col(row, "created_at", ctx)?,
        updated_at: exec::col(row, "updated_at", ctx)?,
        follow_up_date: None,
        outcome: None,
        lead_id: None,
        attachment_path: None,
    };
    if projection.contains("follow_up_date") {
        record.follow_up_date = exec::col(row, "follow_up_date", ctx)?;
    }
    if projection.contains("outcome") {
        record.outcome = exec::col(row, "outcome", ctx)?;
    }
    if projection.contains("lead_id") {
        record.lead_id = exec::col(row, "lead_id", ctx)?;
    }
    if projection.contains("attachment_path") {
        record.attachment_path = exec::col(row, "attachment_path", ctx)?;
    }
    Ok(record)
}

fn export_cell(record: &MeetingRecord, column: &str) -> String {
    match column {
        "id" => record.id.to_string(),
        "title" => record.title.clone(),
        "meeting_date" => record.meeting_date.to_string(),
        "start_time" => record.start_time.clone().unwrap_or_default(),
        "location" => record.location.clone().unwrap_or_default(),
        "assigned_to" => record.assigned_to.map(|v| v.to_string()).unwrap_or_default(),
        "notes" => record.notes.clone().unwrap_or_default(),
        "created_by" => record.created_by.to_string(),
        "created_at" => record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "updated_at" => record.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "follow_up_date" => record
            .follow_up_date
            .map(|d| d.to_string())
            .unwrap_or_default(),
        "outcome" => record.outcome.clone().unwrap_or_default(),
        "lead_id" => record.lead_id.map(|v| v.to_string()).unwrap_or_default(),
        "attachment_path" => record.attachment_path.clone().unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_date_are_required() {
        let errors = validate(&MeetingInput::default());
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Title"));
        assert!(errors[1].contains("Meeting date"));
    }

    #[test]
    fn future_meeting_dates_are_fine() {
        let input = MeetingInput {
            title: "Site walkthrough".to_string(),
            meeting_date: NaiveDate::from_ymd_opt(2030, 1, 15),
            ..Default::default()
        };
        assert!(validate(&input).is_empty());
    }
}
