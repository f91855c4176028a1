//! Order Persistence Adapters
//!
//! Durable storage is owned by the surrounding platform. The in-memory
//! store here keeps the engine runnable standalone and backs the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::application::ports::{ExecutionOutcome, NewOrder, OrderStoreError, OrderStorePort};
use crate::domain::watch::OrderId;

/// Lifecycle of a stored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// Placed, not yet executed.
    Open,
    /// Executed by a stop-loss trigger.
    Filled,
}

#[derive(Debug, Clone)]
struct StoredOrder {
    order: NewOrder,
    status: OrderStatus,
}

/// Order store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, StoredOrder>>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }

    /// Status of an order, if it exists.
    #[must_use]
    pub fn status(&self, order_id: &OrderId) -> Option<OrderStatus> {
        self.orders.read().get(order_id).map(|stored| stored.status)
    }

    /// Whether an order has been filled.
    #[must_use]
    pub fn is_executed(&self, order_id: &OrderId) -> bool {
        self.status(order_id) == Some(OrderStatus::Filled)
    }

    /// Number of filled orders.
    #[must_use]
    pub fn filled_count(&self) -> usize {
        self.orders
            .read()
            .values()
            .filter(|stored| stored.status == OrderStatus::Filled)
            .count()
    }
}

#[async_trait]
impl OrderStorePort for InMemoryOrderStore {
    async fn create_order(&self, order: NewOrder) -> Result<OrderId, OrderStoreError> {
        let order_id = OrderId::new(Uuid::new_v4().to_string());
        self.orders.write().insert(
            order_id.clone(),
            StoredOrder {
                order,
                status: OrderStatus::Open,
            },
        );
        Ok(order_id)
    }

    async fn mark_executed(&self, order_id: &OrderId) -> Result<ExecutionOutcome, OrderStoreError> {
        let mut orders = self.orders.write();
        let stored = orders
            .get_mut(order_id)
            .ok_or_else(|| OrderStoreError::NotFound {
                order_id: order_id.to_string(),
            })?;

        match stored.status {
            OrderStatus::Filled => Ok(ExecutionOutcome::AlreadyFilled),
            OrderStatus::Open => {
                stored.status = OrderStatus::Filled;
                tracing::debug!(
                    order_id = %order_id,
                    user_id = stored.order.user_id,
                    symbol = %stored.order.symbol,
                    quantity = %stored.order.quantity,
                    "Order filled"
                );
                Ok(ExecutionOutcome::Filled)
            }
        }
    }
}
