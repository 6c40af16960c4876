use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::order::{Order, OrderId, OrderStatus};
use super::dead_letter_store::{DeadLetter, DeadLetterSink};
use super::order_repository::{OrderRepository, RepositoryError};

// ============================================================================
// In-Memory Stores - test doubles with failure injection
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<Mutex<HashMap<OrderId, Order>>>,
    calls: Arc<Mutex<Vec<String>>>,
    fail_writes: Arc<Mutex<bool>>,
    interleaved_status: Arc<Mutex<Option<OrderStatus>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(self, order: Order) -> Self {
        self.orders.lock().unwrap().insert(order.id.clone(), order);
        self
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Another writer sets `status` just before the next status update lands.
    pub fn interleave_status_write(&self, status: OrderStatus) {
        *self.interleaved_status.lock().unwrap() = Some(status);
    }

    pub fn order(&self, id: &str) -> Option<Order> {
        self.orders.lock().unwrap().get(&OrderId::from(id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    /// Operation log, e.g. `["get_order:42", "save_order:42"]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_writes(&self, operation: &'static str) -> Result<(), RepositoryError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(RepositoryError::store(operation, "injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        self.log("get_orders".to_string());
        let mut orders: Vec<Order> = self.orders.lock().unwrap().values().cloned().collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        self.log(format!("get_order:{}", id));
        Ok(self.orders.lock().unwrap().get(id).cloned())
    }

    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError> {
        self.log(format!("save_order:{}", order.id));
        self.check_writes("save_order")?;
        self.orders
            .lock()
            .unwrap()
            .insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        self.log(format!("update_order_status:{}:{}", id, status));
        self.check_writes("update_order_status")?;
        if let Some(changed) = self.interleaved_status.lock().unwrap().take() {
            if let Some(order) = self.orders.lock().unwrap().get_mut(id) {
                order.status = changed;
            }
        }
        match self.orders.lock().unwrap().get_mut(id) {
            Some(order) if order.status == expected => {
                order.status = status;
                Ok(())
            }
            Some(order) => Err(RepositoryError::Conflict {
                id: id.clone(),
                expected,
                actual: order.status.to_string(),
            }),
            None => Err(RepositoryError::NotFound(id.clone())),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDeadLetterSink {
    letters: Arc<Mutex<Vec<DeadLetter>>>,
    fail: Arc<Mutex<bool>>,
}

impl InMemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterSink {
    async fn dead_letter(&self, letter: DeadLetter) -> anyhow::Result<()> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("injected dead-letter failure");
        }
        self.letters.lock().unwrap().push(letter);
        Ok(())
    }

    async fn recent(&self, limit: i32) -> anyhow::Result<Vec<DeadLetter>> {
        let letters = self.letters.lock().unwrap();
        Ok(letters.iter().rev().take(limit.max(0) as usize).cloned().collect())
    }
}
