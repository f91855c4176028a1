//! Port Interfaces
//!
//! Contracts between the matching core and the systems around it.
//!
//! ## Driven Ports (Outbound)
//!
//! - `WatchQueuePort`: Shared priority collection of pending watches
//! - `OrderStorePort`: Order persistence owned by the intake side
//! - `PriceSourcePort`: Current price lookup used by the feed
//! - `EngineMetrics`: Counters emitted by workers and the execution sink

mod metrics_port;
mod order_store_port;
mod price_source_port;
mod watch_queue_port;

pub use metrics_port::{DrainPassSummary, EngineMetrics, SharedMetrics};
pub use order_store_port::{ExecutionOutcome, NewOrder, OrderStoreError, OrderStorePort};
#[cfg(test)]
pub use order_store_port::MockOrderStorePort;
pub use price_source_port::{PriceSourceError, PriceSourcePort};
pub use watch_queue_port::{QueueError, SharedWatchQueue, WatchQueuePort};
