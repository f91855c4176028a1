//! Engine Metrics Port (Driven Port)
//!
//! Counters are emitted through an explicit handle passed to each component
//! at construction, so tests can observe them without a global recorder.

use std::sync::Arc;

use crate::domain::codec::PayloadKind;

/// Counters accumulated by one worker over one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainPassSummary {
    /// Worker that ran the pass.
    pub worker_id: String,
    /// Tick that started the pass.
    pub tick_id: String,
    /// Entries evaluated.
    pub checked: u64,
    /// Entries executed.
    pub executed: u64,
    /// Entries dropped on expiry.
    pub expired: u64,
    /// Entries dropped because their payload could not be decoded.
    pub malformed: u64,
}

/// Sink for engine counters.
pub trait EngineMetrics: Send + Sync {
    /// A worker received a tick and started a drain pass.
    fn record_tick_processed(&self, worker_id: &str);

    /// A worker finished a drain pass.
    fn record_drain_pass(&self, summary: &DrainPassSummary);

    /// The execution sink processed an order.
    fn record_order_executed(&self);

    /// The execution sink could not record an execution.
    fn record_execution_failure(&self);

    /// A payload was dropped because it could not be decoded.
    fn record_malformed_payload(&self, kind: PayloadKind);

    /// A watch queue operation failed.
    fn record_queue_error(&self, operation: &'static str);

    /// A tick could not be produced or published.
    fn record_tick_dropped(&self, symbol: &str);

    /// Ticks a lagging worker missed.
    fn record_ticks_lagged(&self, worker_id: &str, skipped: u64);

    /// Current watch queue depth.
    fn set_queue_depth(&self, depth: usize);
}

/// Shared metrics handle.
pub type SharedMetrics = Arc<dyn EngineMetrics>;
