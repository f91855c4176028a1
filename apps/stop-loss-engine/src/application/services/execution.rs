//! Execution Sink
//!
//! Records that a triggered watch's order has been executed. The watch queue
//! guarantees a single holder per watch, so `execute` runs at most once per
//! watch under normal operation; an order the store already shows as filled
//! is still accepted as a no-op so restart replays do not error.

use std::sync::Arc;

use crate::application::ports::{
    ExecutionOutcome, OrderStoreError, OrderStorePort, SharedMetrics,
};
use crate::domain::watch::OrderId;

/// Execution sink error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    /// The order store rejected or failed the update.
    #[error("failed to mark order {order_id} executed: {source}")]
    Store {
        /// Order being executed.
        order_id: OrderId,
        /// Underlying store error.
        source: OrderStoreError,
    },
}

/// Marks orders executed and emits the global executed counter.
pub struct ExecutionSink {
    store: Arc<dyn OrderStorePort>,
    metrics: SharedMetrics,
}

impl ExecutionSink {
    /// Create a sink over an order store.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStorePort>, metrics: SharedMetrics) -> Self {
        Self { store, metrics }
    }

    /// Execute the order behind a triggered watch.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Store` if the order store fails. The watch
    /// has already left the queue at this point and is not retried.
    pub async fn execute(&self, order_id: &OrderId) -> Result<ExecutionOutcome, ExecutionError> {
        self.metrics.record_order_executed();

        match self.store.mark_executed(order_id).await {
            Ok(ExecutionOutcome::Filled) => {
                tracing::info!(order_id = %order_id, "Executing stop-loss order");
                Ok(ExecutionOutcome::Filled)
            }
            Ok(ExecutionOutcome::AlreadyFilled) => {
                tracing::warn!(order_id = %order_id, "Order already filled, skipping execution");
                Ok(ExecutionOutcome::AlreadyFilled)
            }
            Err(source) => {
                self.metrics.record_execution_failure();
                tracing::error!(order_id = %order_id, error = %source, "Failed to execute order");
                Err(ExecutionError::Store {
                    order_id: order_id.clone(),
                    source,
                })
            }
        }
    }
}

impl std::fmt::Debug for ExecutionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSink").finish_non_exhaustive()
    }
}
