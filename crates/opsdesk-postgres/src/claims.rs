//! Reimbursement claims with a two-step approval workflow.
//!
//! A claim is Submitted when created; an approver with edit-all moves it to
//! Approved or Rejected exactly once. The approval columns are optional in
//! schema, so installations without them still run the workflow, just
//! without the audit fields.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::PgPool;

use opsdesk_core::{
    build_insert, build_update, ListQuery, OpsError, Projection, RecordFields,
    ResolvedProjection, Result, RowScope, SchemaRegistry, TableSpec,
};

use crate::exec;

pub const CLAIMS: TableSpec = TableSpec {
    table: "claims",
    resource: "claims",
    base_columns: &[
        "id",
        "claim_date",
        "category",
        "amount",
        "description",
        "status",
        "created_by",
        "created_at",
        "updated_at",
    ],
    optional_columns: &["approved_by", "approved_at", "deleted_at"],
    text_search_columns: &["description", "category"],
    owner_column: "created_by",
    assignee_column: None,
    restricted_scope: RowScope::Own,
};

pub const CLAIM_CATEGORIES: [&str; 5] = ["Travel", "Meals", "Lodging", "Supplies", "Other"];

pub const CLAIM_STATUSES: [&str; 3] = ["Submitted", "Approved", "Rejected"];

#[derive(Debug, Clone)]
pub struct ClaimRecord {
    pub id: i64,
    pub claim_date: NaiveDate,
    pub category: String,
    pub amount: Decimal,
    pub description: String,
    pub status: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ClaimInput {
    pub claim_date: Option<NaiveDate>,
    pub category: String,
    pub amount: Option<Decimal>,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClaimFilters {
    pub q: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<String>,
    pub status: Option<String>,
}

pub fn validate(input: &ClaimInput, today: NaiveDate) -> Vec<String> {
    let mut errors = Vec::new();
    match input.claim_date {
        None => errors.push("Claim date is required.".to_string()),
        Some(date) if date > today => {
            errors.push("Claim date cannot be in the future.".to_string());
        }
        Some(_) => {}
    }
    if !CLAIM_CATEGORIES.contains(&input.category.as_str()) {
        errors.push("Category must be one of the listed options.".to_string());
    }
    match input.amount {
        None => errors.push("Amount is required.".to_string()),
        Some(amount) if amount <= Decimal::ZERO => {
            errors.push("Amount must be greater than zero.".to_string());
        }
        Some(_) => {}
    }
    if input.description.trim().is_empty() {
        errors.push("Description is required.".to_string());
    }
    errors
}

pub struct ClaimsService {
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
}

impl ClaimsService {
    pub fn new(pool: PgPool, registry: Arc<SchemaRegistry>) -> Self {
        Self { pool, registry }
    }

    fn projection(&self) -> ResolvedProjection {
        Projection::for_spec(&CLAIMS).resolve(&self.registry, CLAIMS.table)
    }

    fn fields_from(input: &ClaimInput) -> RecordFields {
        RecordFields::new()
            .set("claim_date", input.claim_date)
            .set("category", input.category.as_str())
            .set("amount", input.amount)
            .set("description", input.description.trim())
    }

    /// New claims always enter the workflow as Submitted.
    pub async fn create(&self, actor_id: i64, input: &ClaimInput) -> Result<i64> {
        let errors = validate(input, Local::now().date_naive());
        if !errors.is_empty() {
            return Err(OpsError::ValidationFailed(errors));
        }
        let now = Utc::now();
        let fields = Self::fields_from(input)
            .set("status", "Submitted")
            .set("created_by", actor_id)
            .set("created_at", now)
            .set("updated_at", now);
        let stmt = build_insert(CLAIMS.table, fields, &self.registry, Some("id"))?;
        exec::insert_returning_id(&self.pool, stmt, "creating claim").await
    }

    /// Edit the claim's own fields. Status is not touched here; it only
    /// moves through `approve`/`reject`.
    pub async fn update(&self, id: i64, input: &ClaimInput) -> Result<()> {
        let errors = validate(input, Local::now().date_naive());
        if !errors.is_empty() {
            return Err(OpsError::ValidationFailed(errors));
        }
        let fields = Self::fields_from(input).set("updated_at", Utc::now());
        let stmt = build_update(CLAIMS.table, fields, &self.registry, "id", id)?;
        exec::execute_required(&self.pool, stmt, "Claim", "updating claim").await
    }

    pub async fn approve(&self, id: i64, approver_id: i64) -> Result<()> {
        self.resolve(id, approver_id, "Approved").await
    }

    pub async fn reject(&self, id: i64, approver_id: i64) -> Result<()> {
        self.resolve(id, approver_id, "Rejected").await
    }

    async fn resolve(&self, id: i64, approver_id: i64, status: &str) -> Result<()> {
        let current = self
            .get(id, approver_id, RowScope::All)
            .await?
            .ok_or_else(|| OpsError::NotFound("Claim".to_string()))?;
        if current.status != "Submitted" {
            return Err(OpsError::validation(
                "Only submitted claims can be approved or rejected.",
            ));
        }
        let fields = RecordFields::new()
            .set("status", status)
            .set("approved_by", approver_id)
            .set("approved_at", Utc::now())
            .set("updated_at", Utc::now());
        let stmt = build_update(CLAIMS.table, fields, &self.registry, "id", id)?;
        exec::execute_required(&self.pool, stmt, "Claim", "resolving claim").await
    }

    pub async fn get(
        &self,
        id: i64,
        actor_id: i64,
        scope: RowScope,
    ) -> Result<Option<ClaimRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(CLAIMS.table, &self.registry)
            .equals("id", id)
            .assemble(scope, &CLAIMS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection.column_list(),
            CLAIMS.table,
            wc.sql
        );
        let row = exec::fetch_optional(&self.pool, &sql, wc.bindings, "loading claim").await?;
        row.map(|r| row_to_record(&r, &projection)).transpose()
    }

    pub async fn list(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &ClaimFilters,
    ) -> Result<Vec<ClaimRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(CLAIMS.table, &self.registry)
            .maybe_equals("category", filters.category.as_deref())
            .maybe_equals("status", filters.status.as_deref())
            .date_from("claim_date", filters.from)
            .date_to("claim_date", filters.to)
            .search(filters.q.as_deref(), CLAIMS.text_search_columns)
            .assemble(scope, &CLAIMS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY claim_date DESC, id DESC",
            projection.column_list(),
            CLAIMS.table,
            wc.sql
        );
        let rows = exec::fetch_all(&self.pool, &sql, wc.bindings, "listing claims").await?;
        rows.iter().map(|r| row_to_record(r, &projection)).collect()
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let affected = if self.registry.has_column(CLAIMS.table, "deleted_at") {
            exec::execute(
                &self.pool,
                "UPDATE claims SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
                vec![id.into()],
                "deleting claim",
            )
            .await?
        } else {
            exec::execute(
                &self.pool,
                "DELETE FROM claims WHERE id = $1",
                vec![id.into()],
                "deleting claim",
            )
            .await?
        };
        if affected == 0 {
            return Err(OpsError::NotFound("Claim".to_string()));
        }
        Ok(())
    }

    pub async fn export_rows(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &ClaimFilters,
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

fn row_to_record(row: &PgRow, projection: &ResolvedProjection) -> Result<ClaimRecord> {
    let ctx = "reading claim row";
    let mut record = ClaimRecord {
        id: exec::col(row, "id", ctx)?,
        claim_date: exec::col(row, "claim_date", ctx)?,
        category: exec::col(row, "category", ctx)?,
        amount: exec::col(row, "amount", ctx)?,
        description: exec::col(row, "description", ctx)?,
        status: exec::col(row, "status", ctx)?,
        created_by: exec::col(row, "created_by", ctx)?,
        created_at: exec::col(row, "created_at", ctx)?,
        updated_at: exec::col(row, "updated_at", ctx)?,
        approved_by: None,
        approved_at: None,
    };
    if projection.contains("approved_by") {
        record.approved_by = exec::col(row, "approved_by", ctx)?;
    }
    if projection.contains("approved_at") {
        record.approved_at = exec::col(row, "approved_at", ctx)?;
    }
    Ok(record)
}

fn export_cell(record: &ClaimRecord, column: &str) -> String {
    match column {
        "id" => record.id.to_string(),
        "claim_date" => record.claim_date.to_string(),
        "category" => record.category.clone(),
        "amount" => record.amount.to_string(),
        "description" => record.description.clone(),
        "status" => record.status.clone(),
        "created_by" => record.created_by.to_string(),
        "created_at" => record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "updated_at" => record.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "approved_by" => record.approved_by.map(|v| v.to_string()).unwrap_or_default(),
        "approved_at" => record
            .approved_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> ClaimInput {
        ClaimInput {
            claim_date: NaiveDate::from_ymd_opt(2026, 8, 20),
            category: "Travel".to_string(),
            amount: Some(Decimal::new(4550, 2)),
            description: "Site visit mileage".to_string(),
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
    fn future_claim_date_is_rejected() {
        let mut input = base_input();
        input.claim_date = NaiveDate::from_ymd_opt(2026, 8, 23);
        let errors = validate(&input, today());
        assert_eq!(errors, vec!["Claim date cannot be in the future.".to_string()]);
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        let mut input = base_input();
        input.amount = Some(Decimal::ZERO);
        assert_eq!(validate(&input, today()).len(), 1);
        input.amount = Some(Decimal::new(-100, 2));
        assert_eq!(validate(&input, today()).len(), 1);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut input = base_input();
        input.category = "Entertainment".to_string();
        let errors = validate(&input, today());
        assert_eq!(errors, vec!["Category must be one of the listed options.".to_string()]);
    }

    #[test]
    fn everything_wrong_accumulates() {
        let input = ClaimInput::default();
        let errors = validate(&input, today());
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn export_cell_blanks_absent_approval_fields() {
        let record = ClaimRecord {
            id: 9,
            claim_date: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
            category: "Meals".to_string(),
            amount: Decimal::new(1899, 2),
            description: "Client lunch".to_string(),
            status: "Submitted".to_string(),
            created_by: 5,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            approved_by: None,
            approved_at: None,
        };
        assert_eq!(export_cell(&record, "amount"), "18.99");
        assert_eq!(export_cell(&record, "approved_by"), "");
        assert_eq!(export_cell(&record, "approved_at"), "");
    }
}
