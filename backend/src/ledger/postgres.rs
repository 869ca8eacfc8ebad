//! Postgres-backed order ledger.
//!
//! Store quantities live in one `store_XXX` column per entry of
//! [`STORE_CODES`](shared::STORE_CODES); the column list is generated from that
//! constant, never from request data. A table CHECK constraint keeps
//! `total_boxes` equal to the sum of the store columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    Activation, ApprovalStatus, NewOrderLine, OrderLine, PackSize, StoreCode, StoreQuantities,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::{
    line_total, validate_line, Decision, DecisionBatch, LedgerError, OrderFilter, OrderLedger,
};

const BASE_COLUMNS: &str = "id, product_code, description, ean, pack_size, submitted_at, \
     submitted_by, activation, total_boxes, status, decided_at";

const INSERT_COLUMNS: &str = "product_code, description, ean, pack_size, submitted_at, \
     submitted_by, activation, total_boxes, status";

#[derive(Clone)]
pub struct PgOrderLedger {
    db: PgPool,
}

impl PgOrderLedger {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn store_columns() -> Vec<String> {
    StoreCode::known().map(|store| store.column_name()).collect()
}

fn to_column(boxes: u32) -> Result<i32, LedgerError> {
    i32::try_from(boxes).map_err(|_| LedgerError::InvalidLine("quantity out of range".to_string()))
}

fn decode_line(row: &PgRow) -> Result<OrderLine, LedgerError> {
    let id: i64 = row.try_get("id")?;
    let corrupt = |reason: String| LedgerError::Corrupt { id, reason };

    let mut quantities = StoreQuantities::new();
    for store in StoreCode::known() {
        let boxes: i32 = row.try_get(store.column_name().as_str())?;
        let boxes = u32::try_from(boxes)
            .map_err(|_| corrupt(format!("negative quantity for store {}", store)))?;
        quantities.set(store, boxes);
    }

    let total_boxes: i32 = row.try_get("total_boxes")?;
    let pack_size: Option<i32> = row.try_get("pack_size")?;
    let activation: String = row.try_get("activation")?;
    let status: String = row.try_get("status")?;

    Ok(OrderLine {
        id,
        product_code: row.try_get("product_code")?,
        description: row.try_get("description")?,
        ean: row.try_get("ean")?,
        pack_size: pack_size.map_or(PackSize::Unknown, |units| PackSize::from_units(units.into())),
        submitted_at: row.try_get("submitted_at")?,
        submitted_by: row.try_get("submitted_by")?,
        activation: activation.parse::<Activation>().map_err(corrupt)?,
        quantities,
        total_boxes: u32::try_from(total_boxes)
            .map_err(|_| corrupt("negative total".to_string()))?,
        status: status.parse::<ApprovalStatus>().map_err(corrupt)?,
        decided_at: row.try_get("decided_at")?,
    })
}

/// One `INSERT` for a validated line, binding every store column
fn insert_line(line: &NewOrderLine) -> Result<QueryBuilder<'_, Postgres>, LedgerError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO order_lines (");
    builder
        .push(INSERT_COLUMNS)
        .push(", ")
        .push(store_columns().join(", "))
        .push(") VALUES (");

    let mut values = builder.separated(", ");
    values
        .push_bind(line.product_code)
        .push_bind(&line.description)
        .push_bind(&line.ean)
        .push_bind(line.pack_size.units().and_then(|units| i32::try_from(units).ok()))
        .push_bind(line.submitted_at)
        .push_bind(&line.submitted_by)
        .push_bind(line.activation.as_str())
        .push_bind(to_column(line.total_boxes)?)
        .push_bind(ApprovalStatus::Pending.as_str());
    for store in StoreCode::known() {
        values.push_bind(to_column(line.quantities.get(&store))?);
    }
    values.push_unseparated(")");
    Ok(builder)
}

fn select_lines(filter: &OrderFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
    builder
        .push(BASE_COLUMNS)
        .push(", ")
        .push(store_columns().join(", "))
        .push(" FROM order_lines WHERE TRUE");

    if let Some(from) = filter.from {
        builder.push(" AND submitted_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND submitted_at < ").push_bind(to);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(user) = &filter.submitted_by {
        builder.push(" AND submitted_by = ").push_bind(user.clone());
    }
    if let Some(ids) = &filter.ids {
        builder.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    builder.push(" ORDER BY submitted_at ASC, id ASC");
    builder
}

/// Conditional `UPDATE`: only a line that is still pending changes
fn decide_line(
    status: ApprovalStatus,
    decided_at: DateTime<Utc>,
    item: &Decision,
) -> Result<QueryBuilder<'static, Postgres>, LedgerError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE order_lines SET status = ");
    builder
        .push_bind(status.as_str())
        .push(", decided_at = ")
        .push_bind(decided_at);

    if let Some(corrected) = &item.corrected {
        for store in StoreCode::known() {
            builder
                .push(", ")
                .push(store.column_name())
                .push(" = ")
                .push_bind(to_column(corrected.get(&store))?);
        }
        builder
            .push(", total_boxes = ")
            .push_bind(to_column(line_total(corrected)?)?);
    }

    builder
        .push(" WHERE id = ")
        .push_bind(item.id)
        .push(format!(" AND status = '{}'", ApprovalStatus::Pending.as_str()));
    Ok(builder)
}

#[async_trait]
impl OrderLedger for PgOrderLedger {
    async fn insert_batch(&self, lines: Vec<NewOrderLine>) -> Result<u64, LedgerError> {
        for line in &lines {
            validate_line(line)?;
        }

        // Start transaction; dropping it without commit rolls everything back
        let mut tx = self.db.begin().await?;
        let mut written = 0;

        for line in &lines {
            let mut builder = insert_line(line)?;
            written += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        tracing::info!(lines = written, "order batch persisted");
        Ok(written)
    }

    async fn query(&self, filter: &OrderFilter) -> Result<Vec<OrderLine>, LedgerError> {
        let mut builder = select_lines(filter);
        let rows = builder.build().fetch_all(&self.db).await?;
        rows.iter().map(decode_line).collect()
    }

    async fn apply_decision(&self, batch: DecisionBatch) -> Result<u64, LedgerError> {
        batch.validate()?;

        let mut tx = self.db.begin().await?;
        let mut affected = 0;

        for item in &batch.items {
            let mut builder = decide_line(batch.status, batch.decided_at, item)?;
            affected += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        tracing::info!(
            status = %batch.status,
            requested = batch.items.len(),
            affected,
            "order decision applied"
        );
        Ok(affected)
    }
}
