//! Order Store Port (Driven Port)
//!
//! Durable order persistence is owned outside the matching core. The core
//! only needs two things from it: intake records a new order and gets an
//! identifier back, and the execution sink marks an order as filled.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::watch::OrderId;

/// Order details recorded at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Placing user.
    pub user_id: i64,
    /// Ticker symbol.
    pub symbol: String,
    /// Order quantity.
    pub quantity: Decimal,
    /// Entry price.
    pub price: Decimal,
    /// Whether a stop-loss watch accompanies the order.
    pub stop_loss: bool,
}

/// Result of marking an order executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The order transitioned to filled.
    Filled,
    /// The order was already filled (e.g. a replay after restart).
    AlreadyFilled,
}

/// Order store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrderStoreError {
    /// No order with this identifier exists.
    #[error("order not found: {order_id}")]
    NotFound {
        /// The unknown order.
        order_id: String,
    },

    /// The store could not be reached.
    #[error("order store unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },
}

/// Port for order persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStorePort: Send + Sync {
    /// Persist a new open order and return its identifier.
    async fn create_order(&self, order: NewOrder) -> Result<OrderId, OrderStoreError>;

    /// Mark an order as filled.
    async fn mark_executed(&self, order_id: &OrderId) -> Result<ExecutionOutcome, OrderStoreError>;
}
