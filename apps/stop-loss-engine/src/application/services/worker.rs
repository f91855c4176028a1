//! Stop-Loss Worker
//!
//! Each worker runs the same loop against the shared watch queue:
//!
//! ```text
//! WaitForTick ──tick──► Draining ──empty batch──► emit counters ──► WaitForTick
//!                          │ ▲
//!                          └─┘ pop_min_batch, evaluate, apply
//! ```
//!
//! A drain pass keeps popping batches until the queue comes back empty.
//! Watches that stay live are held by the worker and reinserted only when
//! the pass ends, so one pass sees each queued watch at most once and the
//! pass terminates. While held, a watch is invisible to other workers,
//! which keeps a single evaluator per watch at any moment.
//!
//! A watch whose reinsert fails stays with the worker in a pending list. The
//! list is retried at the start of the next pass and once more before the
//! worker exits, so a queue outage delays watches instead of losing them.
//!
//! Workers do not coordinate with each other beyond the queue's atomic pop.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{DrainPassSummary, SharedMetrics, SharedWatchQueue};
use crate::application::services::ExecutionSink;
use crate::domain::codec::PayloadKind;
use crate::domain::evaluator::{Decision, evaluate};
use crate::domain::tick::{TickEvent, TickPayload};
use crate::domain::watch::{QueueItem, WatchEntry};

/// Default number of watches popped per batch.
pub const DEFAULT_BATCH_SIZE: usize = 40;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identity used in logs and metrics.
    pub worker_id: String,
    /// Maximum watches popped per batch.
    pub batch_size: usize,
}

impl WorkerConfig {
    /// Configuration for the `index`-th worker of the pool.
    #[must_use]
    pub fn numbered(index: usize, batch_size: usize) -> Self {
        Self {
            worker_id: format!("worker-{index}"),
            batch_size,
        }
    }
}

/// Why a drain pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStop {
    /// The queue returned an empty batch.
    Exhausted,
    /// A queue pop failed; the pass resumes on the next tick.
    QueueError,
    /// Shutdown was requested between batches.
    Shutdown,
}

/// Result of one drain pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Counters accumulated by the pass.
    pub summary: DrainPassSummary,
    /// Why the pass ended.
    pub stop: DrainStop,
}

/// A tick-driven stop-loss worker.
pub struct Worker {
    config: WorkerConfig,
    queue: SharedWatchQueue,
    sink: Arc<ExecutionSink>,
    metrics: SharedMetrics,
    pending: Mutex<Vec<QueueItem>>,
}

impl Worker {
    /// Create a worker over the shared queue.
    #[must_use]
    pub fn new(
        config: WorkerConfig,
        queue: SharedWatchQueue,
        sink: Arc<ExecutionSink>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            config,
            queue,
            sink,
            metrics,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Worker identity.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.worker_id
    }

    /// Watches whose reinsert failed and that wait for the next pass.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Run until `shutdown` is cancelled or the tick broadcast closes.
    pub async fn run(
        self,
        mut ticks: broadcast::Receiver<TickPayload>,
        shutdown: CancellationToken,
    ) {
        tracing::info!(worker_id = %self.config.worker_id, "Worker started");

        loop {
            let payload = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                received = ticks.recv() => match received {
                    Ok(payload) => payload,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            worker_id = %self.config.worker_id,
                            skipped,
                            "Worker lagging behind tick broadcast"
                        );
                        self.metrics.record_ticks_lagged(&self.config.worker_id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!(worker_id = %self.config.worker_id, "Tick broadcast closed");
                        break;
                    }
                },
            };

            let tick = match TickEvent::decode(&payload) {
                Ok(tick) => tick,
                Err(e) => {
                    tracing::warn!(worker_id = %self.config.worker_id, error = %e, "Dropping tick");
                    self.metrics.record_malformed_payload(e.kind());
                    continue;
                }
            };

            if self.drain(&tick, &shutdown).await.stop == DrainStop::Shutdown {
                break;
            }
        }

        self.retry_pending().await;
        let stranded = self.pending_len();
        if stranded > 0 {
            tracing::error!(
                worker_id = %self.config.worker_id,
                stranded,
                "Worker stopped with watches the queue would not take back"
            );
        }

        tracing::info!(worker_id = %self.config.worker_id, "Worker stopped");
    }

    /// Run one drain pass for `tick`.
    ///
    /// Shutdown is only observed between batches: a popped batch is always
    /// fully evaluated and its live watches reinserted before returning.
    /// Watches left pending by an earlier pass are reinserted first.
    pub async fn drain(&self, tick: &TickEvent, shutdown: &CancellationToken) -> DrainOutcome {
        self.metrics.record_tick_processed(&self.config.worker_id);
        self.retry_pending().await;

        let mut summary = DrainPassSummary {
            worker_id: self.config.worker_id.clone(),
            tick_id: tick.tick_id(),
            ..DrainPassSummary::default()
        };
        let mut held = Vec::new();

        let stop = loop {
            if shutdown.is_cancelled() {
                break DrainStop::Shutdown;
            }

            let batch = match self.queue.pop_min_batch(self.config.batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(worker_id = %self.config.worker_id, error = %e, "Failed to pop watch batch");
                    self.metrics.record_queue_error("pop");
                    break DrainStop::QueueError;
                }
            };

            if batch.is_empty() {
                break DrainStop::Exhausted;
            }

            let now = Utc::now();
            for item in batch {
                if let Some(live) = self.apply(item, tick, now, &mut summary).await {
                    held.push(live);
                }
            }
        };

        self.reinsert(held).await;
        self.metrics.record_drain_pass(&summary);

        tracing::debug!(
            worker_id = %summary.worker_id,
            tick_id = %summary.tick_id,
            checked = summary.checked,
            executed = summary.executed,
            expired = summary.expired,
            malformed = summary.malformed,
            stop = ?stop,
            "Drain pass complete"
        );

        DrainOutcome { summary, stop }
    }

    /// Evaluate one popped item. Returns the item to reinsert, if it stays live.
    async fn apply(
        &self,
        item: QueueItem,
        tick: &TickEvent,
        now: chrono::DateTime<Utc>,
        summary: &mut DrainPassSummary,
    ) -> Option<QueueItem> {
        let entry = match WatchEntry::decode(&item.payload) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    worker_id = %self.config.worker_id,
                    error = %e,
                    payload = %item.payload,
                    "Dropping unreadable watch"
                );
                self.metrics.record_malformed_payload(PayloadKind::Watch);
                summary.malformed += 1;
                return None;
            }
        };

        summary.checked += 1;

        let decision = evaluate(&entry, item.score, tick.price, &tick.symbol, now);
        tracing::trace!(
            worker_id = %self.config.worker_id,
            order_id = %entry.order_id,
            decision = decision.as_str(),
            "Watch evaluated"
        );

        match decision {
            Decision::Execute => {
                summary.executed += 1;
                // Failures are logged and counted by the sink; the watch is not requeued.
                let _ = self.sink.execute(&entry.order_id).await;
                None
            }
            Decision::Expire => {
                summary.expired += 1;
                tracing::info!(
                    order_id = %entry.order_id,
                    symbol = %entry.symbol,
                    expires_at = %entry.expires_at,
                    "Stop-loss watch expired"
                );
                None
            }
            requeue @ (Decision::RequeueUnchanged(_) | Decision::RequeueUpdated(_)) => {
                requeue.requeue_score().map(|score| item.with_score(score))
            }
        }
    }

    /// Put live watches back. Once an insert fails the rest are not tried;
    /// everything not reinserted moves to the pending list.
    async fn reinsert(&self, held: Vec<QueueItem>) {
        let mut items = held.into_iter();
        while let Some(item) = items.next() {
            if let Err(e) = self.queue.insert(item.clone()).await {
                let mut failed = vec![item];
                failed.extend(items.by_ref());
                tracing::warn!(
                    worker_id = %self.config.worker_id,
                    error = %e,
                    held = failed.len(),
                    "Failed to requeue watches, holding them for the next pass"
                );
                self.metrics.record_queue_error("insert");
                self.pending.lock().extend(failed);
                return;
            }
        }
    }

    async fn retry_pending(&self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        if pending.is_empty() {
            return;
        }
        tracing::info!(
            worker_id = %self.config.worker_id,
            count = pending.len(),
            "Requeueing held watches"
        );
        self.reinsert(pending).await;
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
