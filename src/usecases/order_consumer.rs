use async_trait::async_trait;
use std::sync::Arc;

use crate::messaging::MessageHandler;

use super::OrderUseCase;

// ============================================================================
// Queue Handlers - bind use case entry points to consumers
// ============================================================================

pub struct OrderPaidHandler {
    use_case: Arc<OrderUseCase>,
}

impl OrderPaidHandler {
    pub fn new(use_case: Arc<OrderUseCase>) -> Self {
        Self { use_case }
    }
}

#[async_trait]
impl MessageHandler for OrderPaidHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        self.use_case.process_order_paid_message(payload).await?;
        Ok(())
    }
}

pub struct OrderStatusHandler {
    use_case: Arc<OrderUseCase>,
}

impl OrderStatusHandler {
    pub fn new(use_case: Arc<OrderUseCase>) -> Self {
        Self { use_case }
    }
}

#[async_trait]
impl MessageHandler for OrderStatusHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        self.use_case.process_order_status_message(payload).await?;
        Ok(())
    }
}
