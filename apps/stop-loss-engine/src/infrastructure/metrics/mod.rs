//! Prometheus Metrics Module
//!
//! Exposes engine counters via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ticks**: Ticks processed, dropped by the feed, missed by lagging workers
//! - **Drain passes**: Entries checked, executed and expired per worker
//! - **Execution**: Global executed counter and store failures
//! - **Health**: Malformed payloads, queue errors, queue depth
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.
//! Components never call the `metrics` macros directly; they receive an
//! [`EngineMetrics`] handle, which is [`PrometheusMetrics`] in production
//! and [`RecordingMetrics`] in tests.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;

use crate::application::ports::{DrainPassSummary, EngineMetrics};
use crate::domain::codec::PayloadKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns `BuildError` if the global recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "stop_loss_ticks_processed_total",
        "Ticks that started a drain pass, by worker"
    );
    describe_counter!(
        "stop_loss_ticks_dropped_total",
        "Ticks the feed failed to fetch or publish, by symbol"
    );
    describe_counter!(
        "stop_loss_ticks_lagged_total",
        "Ticks skipped by a lagging worker"
    );

    describe_counter!(
        "stop_loss_drain_passes_total",
        "Completed drain passes, by worker"
    );
    describe_counter!(
        "stop_loss_orders_checked_total",
        "Watch entries evaluated, by worker"
    );
    describe_counter!(
        "stop_loss_executed_total",
        "Watch entries that triggered, by worker"
    );
    describe_counter!(
        "stop_loss_watches_expired_total",
        "Watch entries dropped on expiry, by worker"
    );
    describe_histogram!(
        "stop_loss_orders_checked_per_pass",
        "Watch entries evaluated in one drain pass"
    );

    describe_counter!(
        "stop_loss_orders_processed_total",
        "Orders handed to the execution sink"
    );
    describe_counter!(
        "stop_loss_execution_failures_total",
        "Executions the order store failed to record"
    );

    describe_counter!(
        "stop_loss_malformed_payloads_total",
        "Payloads dropped because they could not be decoded, by kind"
    );
    describe_counter!(
        "stop_loss_queue_errors_total",
        "Failed watch queue operations"
    );
    describe_gauge!("stop_loss_queue_depth", "Watch entries currently queued");
}

// =============================================================================
// Prometheus Handle
// =============================================================================

/// [`EngineMetrics`] backed by the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl EngineMetrics for PrometheusMetrics {
    fn record_tick_processed(&self, worker_id: &str) {
        counter!("stop_loss_ticks_processed_total", "worker_id" => worker_id.to_string())
            .increment(1);
    }

    fn record_drain_pass(&self, summary: &DrainPassSummary) {
        let worker_id = summary.worker_id.clone();
        counter!("stop_loss_drain_passes_total", "worker_id" => worker_id.clone()).increment(1);
        counter!("stop_loss_orders_checked_total", "worker_id" => worker_id.clone())
            .increment(summary.checked);
        counter!("stop_loss_executed_total", "worker_id" => worker_id.clone())
            .increment(summary.executed);
        counter!("stop_loss_watches_expired_total", "worker_id" => worker_id.clone())
            .increment(summary.expired);
        #[allow(clippy::cast_precision_loss)]
        histogram!("stop_loss_orders_checked_per_pass", "worker_id" => worker_id)
            .record(summary.checked as f64);
    }

    fn record_order_executed(&self) {
        counter!("stop_loss_orders_processed_total").increment(1);
    }

    fn record_execution_failure(&self) {
        counter!("stop_loss_execution_failures_total").increment(1);
    }

    fn record_malformed_payload(&self, kind: PayloadKind) {
        counter!("stop_loss_malformed_payloads_total", "kind" => kind.as_str()).increment(1);
    }

    fn record_queue_error(&self, operation: &'static str) {
        counter!("stop_loss_queue_errors_total", "operation" => operation).increment(1);
    }

    fn record_tick_dropped(&self, symbol: &str) {
        counter!("stop_loss_ticks_dropped_total", "symbol" => symbol.to_string()).increment(1);
    }

    fn record_ticks_lagged(&self, worker_id: &str, skipped: u64) {
        counter!("stop_loss_ticks_lagged_total", "worker_id" => worker_id.to_string())
            .increment(skipped);
    }

    fn set_queue_depth(&self, depth: usize) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("stop_loss_queue_depth").set(depth as f64);
    }
}

// =============================================================================
// Recording Handle
// =============================================================================

/// In-process [`EngineMetrics`] that keeps plain totals for assertions.
///
/// Intended for tests. Every drain pass summary is kept, so a long-running
/// process should use [`PrometheusMetrics`] instead.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    ticks_processed: AtomicU64,
    orders_executed: AtomicU64,
    execution_failures: AtomicU64,
    malformed_ticks: AtomicU64,
    malformed_watches: AtomicU64,
    queue_errors: AtomicU64,
    ticks_dropped: AtomicU64,
    ticks_lagged: AtomicU64,
    queue_depth: AtomicUsize,
    passes: Mutex<Vec<DrainPassSummary>>,
}

impl RecordingMetrics {
    /// Ticks that started a drain pass.
    #[must_use]
    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed.load(Ordering::Relaxed)
    }

    /// Orders handed to the execution sink.
    #[must_use]
    pub fn orders_executed(&self) -> u64 {
        self.orders_executed.load(Ordering::Relaxed)
    }

    /// Executions the order store failed to record.
    #[must_use]
    pub fn execution_failures(&self) -> u64 {
        self.execution_failures.load(Ordering::Relaxed)
    }

    /// Malformed payloads of one kind.
    #[must_use]
    pub fn malformed_payloads(&self, kind: PayloadKind) -> u64 {
        match kind {
            PayloadKind::Tick => self.malformed_ticks.load(Ordering::Relaxed),
            PayloadKind::Watch => self.malformed_watches.load(Ordering::Relaxed),
        }
    }

    /// Failed queue operations.
    #[must_use]
    pub fn queue_errors(&self) -> u64 {
        self.queue_errors.load(Ordering::Relaxed)
    }

    /// Ticks the feed dropped.
    #[must_use]
    pub fn ticks_dropped(&self) -> u64 {
        self.ticks_dropped.load(Ordering::Relaxed)
    }

    /// Ticks missed by lagging workers.
    #[must_use]
    pub fn ticks_lagged(&self) -> u64 {
        self.ticks_lagged.load(Ordering::Relaxed)
    }

    /// Last reported queue depth.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Every drain pass summary recorded so far.
    #[must_use]
    pub fn drain_passes(&self) -> Vec<DrainPassSummary> {
        self.passes.lock().clone()
    }

    /// Entries checked across all passes.
    #[must_use]
    pub fn orders_checked(&self) -> u64 {
        self.passes.lock().iter().map(|p| p.checked).sum()
    }

    /// Entries expired across all passes.
    #[must_use]
    pub fn watches_expired(&self) -> u64 {
        self.passes.lock().iter().map(|p| p.expired).sum()
    }
}

impl EngineMetrics for RecordingMetrics {
    fn record_tick_processed(&self, _worker_id: &str) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_drain_pass(&self, summary: &DrainPassSummary) {
        self.passes.lock().push(summary.clone());
    }

    fn record_order_executed(&self) {
        self.orders_executed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_execution_failure(&self) {
        self.execution_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_malformed_payload(&self, kind: PayloadKind) {
        let counter = match kind {
            PayloadKind::Tick => &self.malformed_ticks,
            PayloadKind::Watch => &self.malformed_watches,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_queue_error(&self, _operation: &'static str) {
        self.queue_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_tick_dropped(&self, _symbol: &str) {
        self.ticks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_ticks_lagged(&self, _worker_id: &str, skipped: u64) {
        self.ticks_lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }
}

// =============================================================================
// Tests
// =============================================================================
