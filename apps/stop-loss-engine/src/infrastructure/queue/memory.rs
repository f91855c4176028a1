//! In-Memory Watch Queue
//!
//! Items are indexed twice: by payload (for insert-or-update) and by
//! `(score, payload)` (for min extraction). Both indexes change under a
//! single lock acquisition, which is what makes `pop_min_batch` atomic.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{QueueError, WatchQueuePort};
use crate::domain::watch::QueueItem;

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, Decimal>,
    ordered: BTreeSet<(Decimal, String)>,
}

impl SortedSet {
    fn upsert(&mut self, payload: String, score: Decimal) {
        if let Some(previous) = self.scores.insert(payload.clone(), score) {
            self.ordered.remove(&(previous, payload.clone()));
        }
        self.ordered.insert((score, payload));
    }

    fn pop_min(&mut self, max: usize) -> Vec<QueueItem> {
        let mut batch = Vec::with_capacity(max.min(self.ordered.len()));
        while batch.len() < max {
            let Some((score, payload)) = self.ordered.pop_first() else {
                break;
            };
            self.scores.remove(&payload);
            batch.push(QueueItem { payload, score });
        }
        batch
    }
}

/// Process-local watch queue.
#[derive(Debug, Default)]
pub struct InMemoryWatchQueue {
    inner: Mutex<SortedSet>,
}

impl InMemoryWatchQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatchQueuePort for InMemoryWatchQueue {
    async fn insert(&self, item: QueueItem) -> Result<(), QueueError> {
        self.inner.lock().upsert(item.payload, item.score);
        Ok(())
    }

    async fn pop_min_batch(&self, max: usize) -> Result<Vec<QueueItem>, QueueError> {
        Ok(self.inner.lock().pop_min(max))
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.inner.lock().scores.len())
    }
}
