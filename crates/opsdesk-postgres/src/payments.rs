//! Payments received against invoices, with an optional receipt upload.
//!
//! Amounts are `rust_decimal::Decimal` bound to NUMERIC; float money does
//! not happen here.

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

pub const PAYMENTS: TableSpec = TableSpec {
    table: "payments",
    resource: "payments",
    base_columns: &[
        "id",
        "invoice_no",
        "amount",
        "paid_on",
        "method",
        "payer_name",
        "created_by",
        "created_at",
        "updated_at",
    ],
    optional_columns: &["reference_no", "lead_id", "receipt_path", "notes", "deleted_at"],
    text_search_columns: &["invoice_no", "payer_name", "reference_no", "notes"],
    owner_column: "created_by",
    assignee_column: None,
    restricted_scope: RowScope::Own,
};

pub const PAYMENT_METHODS: [&str; 5] = ["Cash", "Cheque", "Bank Transfer", "Card", "UPI"];

#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: i64,
    pub invoice_no: String,
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    pub method: String,
    pub payer_name: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reference_no: Option<String>,
    pub lead_id: Option<i64>,
    pub receipt_path: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentInput {
    pub invoice_no: String,
    pub amount: Option<Decimal>,
    pub paid_on: Option<NaiveDate>,
    pub method: String,
    pub payer_name: Option<String>,
    pub reference_no: Option<String>,
    pub lead_id: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilters {
    pub q: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub method: Option<String>,
}

pub fn validate(input: &PaymentInput, today: NaiveDate) -> Vec<String> {
    let mut errors = Vec::new();
    if input.invoice_no.trim().is_empty() {
        errors.push("Invoice number is required.".to_string());
    }
    match input.amount {
        None => errors.push("Amount is required.".to_string()),
        Some(amount) if amount <= Decimal::ZERO => {
            errors.push("Amount must be greater than zero.".to_string());
        }
        Some(_) => {}
    }
    match input.paid_on {
        None => errors.push("Payment date is required.".to_string()),
        Some(date) if date > today => {
            errors.push("Payment date cannot be in the future.".to_string());
        }
        Some(_) => {}
    }
    if !PAYMENT_METHODS.contains(&input.method.as_str()) {
        errors.push("Payment method must be one of the listed options.".to_string());
    }
    errors
}

pub struct PaymentsService {
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
}

impl PaymentsService {
    pub fn new(pool: PgPool, registry: Arc<SchemaRegistry>) -> Self {
        Self { pool, registry }
    }

    fn projection(&self) -> ResolvedProjection {
        Projection::for_spec(&PAYMENTS).resolve(&self.registry, PAYMENTS.table)
    }

    fn fields_from(input: &PaymentInput) -> RecordFields {
        RecordFields::new()
            .set("invoice_no", input.invoice_no.trim())
            .set("amount", input.amount)
            .set("paid_on", input.paid_on)
            .set("method", input.method.as_str())
            .set("payer_name", input.payer_name.clone())
            .set("reference_no", input.reference_no.clone())
            .set("lead_id", input.lead_id)
            .set("notes", input.notes.clone())
    }

    pub async fn create(
        &self,
        actor_id: i64,
        input: &PaymentInput,
        receipt_path: Option<String>,
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
            .set_if_some("receipt_path", receipt_path);
        let stmt = build_insert(PAYMENTS.table, fields, &self.registry, Some("id"))?;
        exec::insert_returning_id(&self.pool, stmt, "creating payment").await
    }

    pub async fn update(
        &self,
        id: i64,
        input: &PaymentInput,
        receipt_path: Option<String>,
    ) -> Result<()> {
        let errors = validate(input, Local::now().date_naive());
        if !errors.is_empty() {
            return Err(OpsError::ValidationFailed(errors));
        }
        let fields = Self::fields_from(input)
            .set("updated_at", Utc::now())
            .set_if_some("receipt_path", receipt_path);
        let stmt = build_update(PAYMENTS.table, fields, &self.registry, "id", id)?;
        exec::execute_required(&self.pool, stmt, "Payment", "updating payment").await
    }

    pub async fn get(
        &self,
        id: i64,
        actor_id: i64,
        scope: RowScope,
    ) -> Result<Option<PaymentRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(PAYMENTS.table, &self.registry)
            .equals("id", id)
            .assemble(scope, &PAYMENTS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection.column_list(),
            PAYMENTS.table,
            wc.sql
        );
        let row = exec::fetch_optional(&self.pool, &sql, wc.bindings, "loading payment").await?;
        row.map(|r| row_to_record(&r, &projection)).transpose()
    }

    pub async fn list(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &PaymentFilters,
    ) -> Result<Vec<PaymentRecord>> {
        let projection = self.projection();
        let wc = ListQuery::new(PAYMENTS.table, &self.registry)
            .maybe_equals("method", filters.method.as_deref())
            .date_from("paid_on", filters.from)
            .date_to("paid_on", filters.to)
            .search(filters.q.as_deref(), PAYMENTS.text_search_columns)
            .assemble(scope, &PAYMENTS.scope_columns(), actor_id);
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY paid_on DESC, id DESC",
            projection.column_list(),
            PAYMENTS.table,
            wc.sql
        );
        let rows = exec::fetch_all(&self.pool, &sql, wc.bindings, "listing payments").await?;
        rows.iter().map(|r| row_to_record(r, &projection)).collect()
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let affected = if self.registry.has_column(PAYMENTS.table, "deleted_at") {
            exec::execute(
                &self.pool,
                "UPDATE payments SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
                vec![id.into()],
                "deleting payment",
            )
            .await?
        } else {
            exec::execute(
                &self.pool,
                "DELETE FROM payments WHERE id = $1",
                vec![id.into()],
                "deleting payment",
            )
            .await?
        };
        if affected == 0 {
            return Err(OpsError::NotFound("Payment".to_string()));
        }
        Ok(())
    }

    pub async fn export_rows(
        &self,
        actor_id: i64,
        scope: RowScope,
        filters: &PaymentFilters,
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

fn row_to_record(row: &PgRow, projection: &ResolvedProjection) -> Result<PaymentRecord> {
    let ctx = "reading payment row";
    let mut record = PaymentRecord {
        id: exec::col(row, "id", ctx)?,
        invoice_no: exec::col(row, "invoice_no", ctx)?,
        amount: exec::col(row, "amount", ctx)?,
        paid_on: exec::col(row, "paid_on", ctx)?,
        method: exec::col(row, "method", ctx)?,
        payer_name: exec::col(row, "payer_name", ctx)?,
        created_by: exec::col(row, "created_by", ctx)?,
        created_at: exec::col(row, "created_at", ctx)?,
        updated_at: exec::col(row, "updated_at", ctx)?,
        reference_no: None,
        lead_id: None,
        receipt_path: None,
        notes: None,
    };
    if projection.contains("reference_no") {
        record.reference_no = exec::col(row, "reference_no", ctx)?;
    }
    if projection.contains("lead_id") {
        record.lead_id = exec::col(row, "lead_id", ctx)?;
    }
    if projection.contains("receipt_path") {
        record.receipt_path = exec::col(row, "receipt_path", ctx)?;
    }
    if projection.contains("notes") {
        record.notes = exec::col(row, "notes", ctx)?;
    }
    Ok(record)
}

fn export_cell(record: &PaymentRecord, column: &str) -> String {
    match column {
        "id" => record.id.to_string(),
        "invoice_no" => record.invoice_no.clone(),
        "amount" => record.amount.to_string(),
        "paid_on" => record.paid_on.to_string(),
        "method" => record.method.clone(),
        "payer_name" => record.payer_name.clone().unwrap_or_default(),
        "created_by" => record.created_by.to_string(),
        "created_at" => record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "updated_at" => record.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "reference_no" => record.reference_no.clone().unwrap_or_default(),
        "lead_id" => record.lead_id.map(|v| v.to_string()).unwrap_or_default(),
        "receipt_path" => record.receipt_path.clone().unwrap_or_default(),
        "notes" => record.notes.clone().unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> PaymentInput {
        PaymentInput {
            invoice_no: "INV-2041".to_string(),
            amount: Some(Decimal::new(125_00, 2)),
            paid_on: NaiveDate::from_ymd_opt(2026, 8, 20),
            method: "Bank Transfer".to_string(),
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 22).unwrap()
    }

    #[test]
    fn valid_payment_passes() {
        assert!(validate(&base_input(), today()).is_empty());
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        let mut input = base_input();
        input.amount = Some(Decimal::ZERO);
        assert_eq!(validate(&input, today()).len(), 1);
        input.amount = Some(Decimal::new(-5, 0));
        assert_eq!(validate(&input, today()).len(), 1);
    }

    #[test]
    fn future_payment_date_is_rejected() {
        let mut input = base_input();
        input.paid_on = NaiveDate::from_ymd_opt(2026, 8, 23);
        let errors = validate(&input, today());
        assert_eq!(errors, vec!["Payment date cannot be in the future.".to_string()]);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let mut input = base_input();
        input.method = "Barter".to_string();
        let errors = validate(&input, today());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Payment method"));
    }

    #[test]
    fn all_violations_accumulate() {
        let input = PaymentInput::default();
        // invoice_no blank, amount missing, paid_on missing, method blank.
        assert_eq!(validate(&input, today()).len(), 4);
    }
}
