use chrono::Utc;
use std::sync::Arc;

use crate::domain::order::{
    Order, OrderError, OrderId, OrderProductionEvent, OrderStatus, OrderStatusEvent,
};
use crate::messaging::{NotifyError, OrderNotifier};
use crate::store::{OrderRepository, RepositoryError};

// ============================================================================
// Order Use Case
// ============================================================================
//
// Orchestrates: payload → Order → Repository → Notifier
//
// Notification only ever follows a successful write. Every error bubbles
// up so the consumer can requeue, which makes the whole path at-least-once:
// - create skips ids that already exist and announces the stored status
// - same-state status updates are accepted
// - status writes are conditioned on the status they were validated against
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UseCaseError {
    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl From<RepositoryError> for UseCaseError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => UseCaseError::OrderNotFound(id),
            other => UseCaseError::Repository(other),
        }
    }
}

/// What `create_order` did, with the status the order now has in the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CreateOutcome {
    Created(OrderStatus),
    AlreadyExists(OrderStatus),
}

impl CreateOutcome {
    pub fn status(&self) -> OrderStatus {
        match self {
            CreateOutcome::Created(status) | CreateOutcome::AlreadyExists(status) => *status,
        }
    }
}

pub struct OrderUseCase {
    repository: Arc<dyn OrderRepository>,
    notifier: Option<Arc<dyn OrderNotifier>>,
}

impl OrderUseCase {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self {
            repository,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn OrderNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub async fn get_orders(&self) -> Result<Vec<Order>, UseCaseError> {
        Ok(self.repository.get_orders().await?)
    }

    /// Moves an existing order to `status`. Only the next status or the
    /// current one is accepted, and the write fails with a conflict if the
    /// stored status changed after it was read.
    pub async fn update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), UseCaseError> {
        let current = self
            .repository
            .get_order(id)
            .await?
            .ok_or_else(|| UseCaseError::OrderNotFound(id.clone()))?;

        let status = current.status.transition_to(status)?;

        self.repository
            .update_order_status(id, current.status, status)
            .await?;

        tracing::info!(
            order_id = %id,
            from = %current.status,
            to = %status,
            "✅ Order status updated"
        );

        self.notify(id, status).await
    }

    /// Persists a new order. An id that already exists is left untouched.
    pub async fn create_order(&self, order: &Order) -> Result<CreateOutcome, UseCaseError> {
        if let Some(existing) = self.repository.get_order(&order.id).await? {
            tracing::info!(
                order_id = %order.id,
                status = %existing.status,
                "Order already exists, skipping create"
            );
            return Ok(CreateOutcome::AlreadyExists(existing.status));
        }

        self.repository.save_order(order).await?;

        tracing::info!(
            order_id = %order.id,
            items = order.items.len(),
            "✅ Order created"
        );
        Ok(CreateOutcome::Created(order.status))
    }

    /// Handles an "order paid" payload: create in the initial status, then
    /// announce the status the order has in the store.
    pub async fn process_order_paid_message(&self, payload: &[u8]) -> Result<(), UseCaseError> {
        let event: OrderProductionEvent = serde_json::from_slice(payload)?;

        let order = Order::new(
            event.id,
            event.items.into_iter().map(Into::into).collect(),
            Utc::now(),
        );

        let outcome = self.create_order(&order).await?;
        self.notify(&order.id, outcome.status()).await
    }

    pub async fn process_order_status_message(&self, payload: &[u8]) -> Result<(), UseCaseError> {
        let event: OrderStatusEvent = serde_json::from_slice(payload)?;
        self.update_order_status(&event.order_id, event.status).await
    }

    async fn notify(&self, id: &OrderId, status: OrderStatus) -> Result<(), UseCaseError> {
        if let Some(ref notifier) = self.notifier {
            notifier.notify_order(id, status).await?;
        }
        Ok(())
    }
}
