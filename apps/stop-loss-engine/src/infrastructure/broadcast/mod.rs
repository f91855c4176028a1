//! Tick Broadcast
//!
//! Fans encoded ticks out to every worker over a tokio broadcast channel.
//!
//! Delivery is at-most-once per subscriber. Each subscriber has its own
//! bounded buffer of `capacity` ticks; a subscriber that falls further
//! behind skips the oldest ticks and observes `RecvError::Lagged`.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::codec::CodecError;
use crate::domain::tick::{TickEvent, TickPayload};

/// Default per-subscriber buffer, in ticks.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Tick publish error.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The tick could not be encoded.
    #[error(transparent)]
    Encode(#[from] CodecError),

    /// Nobody is subscribed; the tick was discarded.
    #[error("no active tick subscribers")]
    NoSubscribers,
}

/// Tick fan-out channel.
///
/// # Example
///
/// ```rust
/// use rust_decimal::Decimal;
/// use stop_loss_engine::domain::tick::TickEvent;
/// use stop_loss_engine::infrastructure::broadcast::TickBroadcast;
///
/// let broadcast = TickBroadcast::new(16);
/// let _rx = broadcast.subscribe();
///
/// let delivered = broadcast
///     .publish(&TickEvent::now("AAPL", Decimal::new(101, 0)))
///     .unwrap();
/// assert_eq!(delivered, 1);
/// ```
#[derive(Debug, Clone)]
pub struct TickBroadcast {
    tx: broadcast::Sender<TickPayload>,
}

impl TickBroadcast {
    /// Create a broadcast with the given per-subscriber capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Encode and publish a tick.
    ///
    /// Returns the number of subscribers the tick was delivered to.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Encode` if the tick cannot be encoded, or
    /// `PublishError::NoSubscribers` if no worker is listening.
    pub fn publish(&self, tick: &TickEvent) -> Result<usize, PublishError> {
        let payload = tick.encode()?;
        self.publish_raw(TickPayload::from(payload))
    }

    /// Publish an already encoded payload.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::NoSubscribers` if no worker is listening.
    pub fn publish_raw(&self, payload: TickPayload) -> Result<usize, PublishError> {
        self.tx
            .send(payload)
            .map_err(|_| PublishError::NoSubscribers)
    }

    /// Get a new subscription. It only observes ticks published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TickPayload> {
        self.tx.subscribe()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for TickBroadcast {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Shared tick broadcast reference.
pub type SharedTickBroadcast = Arc<TickBroadcast>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tokio::sync::broadcast::error::RecvError;

    use super::*;

    fn tick(symbol: &str) -> TickEvent {
        TickEvent::now(symbol, Decimal::new(10_000, 2))
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let broadcast = TickBroadcast::default();
        assert_eq!(broadcast.subscriber_count(), 0);

        let rx = broadcast.subscribe();
        let _rx2 = broadcast.subscribe();
        assert_eq!(broadcast.subscriber_count(), 2);

        drop(rx);
        assert_eq!(broadcast.subscriber_count(), 1);
    }

    #[test]
    fn publish_without_subscribers_fails() {
        let broadcast = TickBroadcast::default();
        assert!(matches!(
            broadcast.publish(&tick("AAPL")),
            Err(PublishError::NoSubscribers)
        ));
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_tick() {
        let broadcast = TickBroadcast::default();
        let mut rx1 = broadcast.subscribe();
        let mut rx2 = broadcast.subscribe();

        let sent = tick("GOOG");
        assert_eq!(broadcast.publish(&sent).unwrap(), 2);

        let r1 = TickEvent::decode(&rx1.recv().await.unwrap()).unwrap();
        let r2 = TickEvent::decode(&rx2.recv().await.unwrap()).unwrap();
        assert_eq!(r1.symbol, "GOOG");
        assert_eq!(r1, r2);
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag() {
        let broadcast = TickBroadcast::new(2);
        let mut rx = broadcast.subscribe();

        for symbol in ["AAPL", "GOOG", "TSLA", "AMZN"] {
            broadcast.publish(&tick(symbol)).unwrap();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(2))));
        let next = TickEvent::decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(next.symbol, "TSLA");
    }

    #[tokio::test]
    async fn raw_payload_is_forwarded_untouched() {
        let broadcast = TickBroadcast::default();
        let mut rx = broadcast.subscribe();

        broadcast.publish_raw(TickPayload::from("garbage")).unwrap();

        assert_eq!(&*rx.recv().await.unwrap(), "garbage");
    }
}
