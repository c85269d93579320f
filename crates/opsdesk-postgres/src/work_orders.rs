//! Work orders: field jobs routed to an assignee, tracked through a status
//! lifecycle. The restricted scope here is Assigned, not Own — a technician
//! sees the orders routed to them, not the ones they happened to key in.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::PgPool;

use opsdesk_core::{
    build_insert, build_update, ListQuery, OpsError, Projection, RecordFields,
    ResolvedProjection, Result, RowScope, SchemaRegistry, TableSpec,
};

use crate::exec;

pub const WORK_ORDERS: TableSpec = TableSpec {
    table: "work_orders",
    resource: "work_orders",
    base_columns: &[
        "id",
        "title",
        "description",
        "status",
        "priority",
        "assigned_to",
        "due_date",
        "created_by",
        "created_at",
        "updated_at",
    ],
    optional_columns: &["completed_at", "client_name", "deleted_at"],
    text_search_columns: &["title", "description", "client_name"],
    owner_column: "created_by",
    assignee_column: Some("assigned_to"),
    restricted_scope: RowScope::Assigned,
};

pub const WORK_ORDER_STATUSES: [&str; 5] =
    ["Open", "In Progress", "On Hold", "Completed", "Cancelled"];

pub const WORK_ORDER_PRIORITIES: [&str; 4] = ["Low", "Medium", "High", "Urgent"];

#[derive(Debug, Clone)]
pub struct WorkOrderRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkOrderInput {
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkOrderFilters {
    pub q: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub assigned_to: Option<i64>,
    pub status: Option<String>,
    pub priority: Option<String>,
}

/// The due-date floor only applies on create; editing an overdue order must
/// stay possible, otherwise stale records can never be closed out.
pub fn validate(input: &WorkOrderInput, today: NaiveDate, on_create: bool) -> Vec<String> {
    let mut errors = Vec::new();
    if input.title.trim().is_empty() {
        errors.push("Title is required.".to_string());
    }
    if !WORK_ORDER_STATUSES.contains(&input.status.as_str()) {
        errors.push("Status must be one of the listed options.".to_string());
    }
    if !WORK_ORDER_PRIORITIES.contains(&input.priority.as_str()) {
        errors.push("Priority must be one of the listed options.".to_string());
    }
    if on_create {
        if let Some(due) = input.due_date {
            if due < today {
                errors.push("Due date cannot be in the past.".to_string());
            }
        }
    }
    errors
}

pub struct WorkOrdersService {
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
}

impl WorkOrdersService {
    pub fn new(pool: PgPool, registry: Arc<SchemaRegistry>) -> Self {
        Self { pool, registry }
    }

    fn projection(&self) -> ResolvedProjection {
        Projection::for_spec(&WORK_ORDERS).resolve(&self.registry, WORK_ORDERS.table)
    }

    fn fields_from(input: &WorkOrderInput) -> RecordFields {
        let fields = RecordFields::new()
            .set("title", input.title.trim())
            .set("description", input.description.clone())
            .set("status", input.status.as_str())
            .set("priority", input.priority.as_str())
            .set("assigned_to", input.assigned_to)
            .set("due_date", input.due_date)
            .set("client_name", input.client_name.clone());
        // `completed_at` rides along with the status; the builder drops it
        // on deployments without the column.
        if input.status == "Completed" {
            fields.set("completed_at", Utc::now())
        } else {
            fields.set("completed_at", None::<DateTime<Utc>>)
        }
    }

    pub async fn create(&self, actor_id: i64, input: &WorkOrderInput) -> Result<i64> {
        let errors = validate(input, Local::now().date_naive(), true);
        if !errors.is_empty() {
            return Err(OpsError::ValidationFailed(errors));
        }
        let now = Utc::now();
        let fields = Self::fields_from(input)
            .set("created_by", actor_id)
            .set("created_at", now)
            .set("updated_at", now);
        let stmt = build_insert(WORK_ORDERS.table, fields, &self.registry, Some("id"))?;
        exec::insert_returning_id(&self.pool, stmt, "creating work order").await
    }

    pub async fn update(&self, id: i64, input: &WorkOrderInput) -> Result<()> {
        let errors = validate(input, Local::now().date_naive(), false);
        if !errors.is_empty() {
            return Err(OpsError::ValidationFailed(errors));
        }
        let fields = Self::fields_from(input).set("updated_at", Utc::now());
        let stmt = build_update(WORK_ORDERS.table, fields, &self.registry, "id", id)?;
        exec::execute_required(&self.pool, stmt, "Work order", "updating work order").await
    }

    pub async fn get(
        &self,
        id: i64,
        actor_id: i64,
        scope: RowScope,
    ) -> Result<Option<WorkOrderRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(WORK_ORDERS.table, &self.registry)
            .equals("id", id)
            .assemble(scope, &WORK_ORDERS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection.column_list(),
            WORK_ORDERS.table,
            wc.sql
        );
        let row = exec::fetch_optional(&self.pool, &sql, wc.bindings, "loading work order").await?;
        row.map(|r| row_to_record(&r, &projection)).transpose()
    }

    pub async fn list(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &WorkOrderFilters,
    ) -> Result<Vec<WorkOrderRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(WORK_ORDERS.table, &self.registry)
            .maybe_equals("status", filters.status.as_deref())
            .maybe_equals("priority", filters.priority.as_deref())
            .maybe_equals("assigned_to", filters.assigned_to)
            .date_from("due_date", filters.from)
            .date_to("due_date", filters.to)
            .search(filters.q.as_deref(), WORK_ORDERS.text_search_columns)
            .assemble(scope, &WORK_ORDERS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY due_date ASC NULLS LAST, id DESC",
            projection.column_list(),
            WORK_ORDERS.table,
            wc.sql
        );
        let rows = exec::fetch_all(&self.pool, &sql, wc.bindings, "listing work orders").await?;
        rows.iter().map(|r| row_to_record(r, &projection)).collect()
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let affected = if self.registry.has_column(WORK_ORDERS.table, "deleted_at") {
            exec::execute(
                &self.pool,
                "UPDATE work_orders SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
                vec![id.into()],
                "deleting work order",
            )
            .await?
        } else {
            exec::execute(
                &self.pool,
                "DELETE FROM work_orders WHERE id = $1",
                vec![id.into()],
                "deleting work order",
            )
            .await?
        };
        if affected == 0 {
            return Err(OpsError::NotFound("Work order".to_string()));
        }
        Ok(())
    }

    pub async fn export_rows(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &WorkOrderFilters,
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

fn row_to_record(row: &PgRow, projection: &ResolvedProjection) -> Result<WorkOrderRecord> {
    let ctx = "reading work order row";
    let mut record = WorkOrderRecord {
        id: exec::col(row, "id", ctx)?,
        title: exec::col(row, "title", ctx)?,
        description: exec::col(row, "description", ctx)?,
        status: exec::col(row, "status", ctx)?,
        priority: exec::col(row, "priority", ctx)?,
        assigned_to: exec::col(row, "assigned_to", ctx)?,
        due_date: exec::col(row, "due_date", ctx)?,
        created_by: exec::col(row, "created_by", ctx)?,
        created_at: exec::col(row, "created_at", ctx)?,
        updated_at: exec::col(row, "updated_at", ctx)?,
        completed_at: None,
        client_name: None,
    };
    if projection.contains("completed_at") {
        record.completed_at = exec::col(row, "completed_at", ctx)?;
    }
    if projection.contains("client_name") {
        record.client_name = exec::col(row, "client_name", ctx)?;
    }
    Ok(record)
}

fn export_cell(record: &WorkOrderRecord, column: &str) -> String {
    match column {
        "id" => record.id.to_string(),
        "title" => record.title.clone(),
        "description" => record.description.clone().unwrap_or_default(),
        "status" => record.status.clone(),
        "priority" => record.priority.clone(),
        "assigned_to" => record.assigned_to.map(|v| v.to_string()).unwrap_or_default(),
        "due_date" => record.due_date.map(|d| d.to_string()).unwrap_or_default(),
        "created_by" => record.created_by.to_string(),
        "created_at" => record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "updated_at" => record.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "completed_at" => record
            .completed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
        "client_name" => record.client_name.clone().unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> WorkOrderInput {
        WorkOrderInput {
            title: "Replace gutter section".to_string(),
            status: "Open".to_string(),
            priority: "Medium".to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 9, 1),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 22).unwrap()
    }

    #[test]
    fn valid_input_passes() {
        assert!(validate(&base_input(), today(), true).is_empty());
    }

    #[test]
    fn past_due_date_rejected_on_create_only() {
        let mut input = base_input();
        input.due_date = NaiveDate::from_ymd_opt(2026, 8, 1);
        let errors = validate(&input, today(), true);
        assert_eq!(errors, vec!["Due date cannot be in the past.".to_string()]);
        assert!(validate(&input, today(), false).is_empty());
    }

    #[test]
    fn due_today_is_allowed() {
        let mut input = base_input();
        input.due_date = Some(today());
        assert!(validate(&input, today(), true).is_empty());
    }

    #[test]
    fn unknown_status_and_priority_accumulate() {
        let mut input = base_input();
        input.status = "Done".to_string();
        input.priority = "ASAP".to_string();
        let errors = validate(&input, today(), true);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Status"));
        assert!(errors[1].contains("Priority"));
    }

    #[test]
    fn completed_status_stamps_completed_at() {
        let mut input = base_input();
        input.status = "Completed".to_string();
        let fields = WorkOrdersService::fields_from(&input);
        let completed = fields
            .iter()
            .find(|(c, _)| *c == "completed_at")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert!(!completed.is_null());

        let fields = WorkOrdersService::fields_from(&base_input());
        let completed = fields
            .iter()
            .find(|(c, _)| *c == "completed_at")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert!(completed.is_null());
    }

    #[test]
    fn restricted_scope_is_assigned() {
        assert_eq!(WORK_ORDERS.restricted_scope, RowScope::Assigned);
    }

    #[test]
    fn export_cell_formats_optionals() {
        let record = WorkOrderRecord {
            id: 4,
            title: "Fix fence".to_string(),
            description: None,
            status: "Open".to_string(),
            priority: "Low".to_string(),
            assigned_to: Some(11),
            due_date: NaiveDate::from_ymd_opt(2026, 9, 3),
            created_by: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
            client_name: None,
        };
        assert_eq!(export_cell(&record, "due_date"), "2026-09-03");
        assert_eq!(export_cell(&record, "assigned_to"), "11");
        assert_eq!(export_cell(&record, "completed_at"), "");
        assert_eq!(export_cell(&record, "client_name"), "");
    }
}
