use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::value::{CqlValue, Row};
use std::sync::Arc;

use crate::domain::order::{Order, OrderId, OrderItem, OrderStatus};
use crate::metrics::Metrics;
use super::order_repository::{OrderRepository, RepositoryError};

// ============================================================================
// ScyllaDB Order Repository
// ============================================================================
//
// Table layout (one row per order):
//
//   id          text PRIMARY KEY
//   entity      text        -- constant "ORDER", secondary index
//   status      text
//   created_at  timestamp
//   finished_at timestamp   -- nullable
//   items       text        -- JSON array
//
// "List all orders" is a lookup on the entity index, never a full scan.
// Status updates are lightweight transactions conditioned on the status the
// caller validated against. An unknown id is reported instead of silently
// creating a partial row, and a concurrent change is reported as a conflict.
//
// ============================================================================

type OrderRow = (
    String,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    String,
);

const COLUMNS: &str = "id, entity, status, created_at, finished_at, items";

pub struct ScyllaOrderRepository {
    session: Arc<Session>,
    table: String,
    metrics: Option<Arc<Metrics>>,
}

impl ScyllaOrderRepository {
    pub fn new(session: Arc<Session>, table: &str) -> Self {
        Self {
            session,
            table: table.to_string(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create the orders table and its entity index when missing.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id text PRIMARY KEY,
                        entity text,
                        status text,
                        created_at timestamp,
                        finished_at timestamp,
                        items text
                    )",
                    self.table
                ),
                &[],
            )
            .await?;

        self.session
            .query_unpaged(
                format!(
                    "CREATE INDEX IF NOT EXISTS {table}_by_entity ON {table} (entity)",
                    table = self.table
                ),
                &[],
            )
            .await?;

        tracing::info!(table = %self.table, "Order table schema ready");
        Ok(())
    }

    fn record(&self, operation: &str, success: bool) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_repository_operation(operation, success);
        }
    }

    async fn query_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let result = self
            .session
            .query_unpaged(
                format!("SELECT {} FROM {} WHERE entity = ?", COLUMNS, self.table),
                (crate::domain::order::ORDER_ENTITY,),
            )
            .await
            .map_err(|e| RepositoryError::store("get_orders", e))?;

        let rows_result = result
            .into_rows_result()
            .map_err(|e| RepositoryError::store("get_orders", e))?;

        let mut orders = Vec::new();
        for row in rows_result
            .rows::<OrderRow>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
        {
            let row = row.map_err(|e| RepositoryError::Decode(e.to_string()))?;
            orders.push(order_from_row(row)?);
        }

        tracing::debug!(count = orders.len(), "Loaded orders from entity index");
        Ok(orders)
    }

    async fn query_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let result = self
            .session
            .query_unpaged(
                format!("SELECT {} FROM {} WHERE id = ?", COLUMNS, self.table),
                (id.as_str(),),
            )
            .await
            .map_err(|e| RepositoryError::store("get_order", e))?;

        let rows_result = result
            .into_rows_result()
            .map_err(|e| RepositoryError::store("get_order", e))?;

        match rows_result
            .maybe_first_row::<OrderRow>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?
        {
            Some(row) => Ok(Some(order_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let items = serde_json::to_string(&order.items)
            .map_err(|e| RepositoryError::store("save_order", e))?;

        self.session
            .query_unpaged(
                format!(
                    "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?)",
                    self.table, COLUMNS
                ),
                (
                    order.id.as_str(),
                    order.entity.as_str(),
                    order.status.as_str(),
                    order.created_at,
                    order.finished_at,
                    items,
                ),
            )
            .await
            .map_err(|e| RepositoryError::store("save_order", e))?;

        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            item_count = order.items.len(),
            "✅ Saved production order"
        );
        Ok(())
    }

    async fn set_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = self
            .session
            .query_unpaged(
                format!("UPDATE {} SET status = ? WHERE id = ? IF status = ?", self.table),
                (status.as_str(), id.as_str(), expected.as_str()),
            )
            .await
            .map_err(|e| RepositoryError::store("update_order_status", e))?;

        let rows_result = result
            .into_rows_result()
            .map_err(|e| RepositoryError::store("update_order_status", e))?;

        let status_index = rows_result
            .column_specs()
            .get_by_name("status")
            .map(|(index, _)| index);
        let row = rows_result
            .maybe_first_row::<Row>()
            .map_err(|e| RepositoryError::store("update_order_status", e))?;

        conditional_update_outcome(id, expected, row, status_index)?;

        tracing::info!(order_id = %id, from = %expected, to = %status, "Updated order status");
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for ScyllaOrderRepository {
    async fn get_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let result = self.query_orders().await;
        self.record("get_orders", result.is_ok());
        result
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let result = self.query_order(id).await;
        self.record("get_order", result.is_ok());
        result
    }

    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let result = self.insert_order(order).await;
        self.record("save_order", result.is_ok());
        result
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = self.set_status(id, expected, status).await;
        self.record("update_order_status", result.is_ok());
        result
    }
}

/// Reads the result of `UPDATE ... IF status = ?`. The first column is
/// `[applied]`; when not applied the current `status` comes back too, null
/// for a missing row.
fn conditional_update_outcome(
    id: &OrderId,
    expected: OrderStatus,
    row: Option<Row>,
    status_index: Option<usize>,
) -> Result<(), RepositoryError> {
    let columns = row.map(|row| row.columns).unwrap_or_default();

    if matches!(columns.first(), Some(Some(CqlValue::Boolean(true)))) {
        return Ok(());
    }

    let actual = status_index
        .and_then(|index| columns.get(index))
        .and_then(|value| value.as_ref())
        .and_then(|value| value.as_text().cloned());

    match actual {
        Some(actual) => Err(RepositoryError::Conflict {
            id: id.clone(),
            expected,
            actual,
        }),
        None => Err(RepositoryError::NotFound(id.clone())),
    }
}

fn order_from_row(row: OrderRow) -> Result<Order, RepositoryError> {
    let (id, entity, status, created_at, finished_at, items) = row;

    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| RepositoryError::Decode(format!("order {}: {}", id, e)))?;
    let items: Vec<OrderItem> = serde_json::from_str(&items)
        .map_err(|e| RepositoryError::Decode(format!("order {} items: {}", id, e)))?;

    Ok(Order {
        id: OrderId::new(id),
        status,
        created_at,
        finished_at,
        items,
        entity,
    })
}
