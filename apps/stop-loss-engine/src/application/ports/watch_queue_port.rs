//! Watch Queue Port (Driven Port)
//!
//! Shared priority collection of pending stop-loss watches, keyed by score.
//!
//! `pop_min_batch` is the one correctness-critical primitive of the whole
//! worker pool: two concurrent calls never return the same item, so no two
//! workers can evaluate (and execute) the same watch at once.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::watch::QueueItem;

/// Watch queue error. Always recoverable: callers skip the current cycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    /// The backing store could not be reached or rejected the command.
    #[error("watch queue unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// A score could not be represented by the backend.
    #[error("score {score} cannot be stored by the watch queue backend")]
    UnrepresentableScore {
        /// The offending score.
        score: String,
    },
}

/// Port for the shared watch queue.
#[async_trait]
pub trait WatchQueuePort: Send + Sync {
    /// Add an item, or update the score of an item with the same payload.
    ///
    /// Unbounded; never waits for capacity.
    async fn insert(&self, item: QueueItem) -> Result<(), QueueError>;

    /// Atomically remove and return up to `max` lowest-scored items,
    /// in ascending score order. Returns an empty batch when empty.
    async fn pop_min_batch(&self, max: usize) -> Result<Vec<QueueItem>, QueueError>;

    /// Number of items currently queued.
    async fn len(&self) -> Result<usize, QueueError>;

    /// Whether the queue currently holds no items.
    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}

/// Shared watch queue handle.
pub type SharedWatchQueue = Arc<dyn WatchQueuePort>;
