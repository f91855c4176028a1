//! Price Feed
//!
//! Publishes one tick per configured symbol every interval. A failure for
//! one symbol drops only that symbol's tick for the round.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{PriceSourceError, PriceSourcePort, SharedMetrics};
use crate::domain::tick::TickEvent;
use crate::infrastructure::broadcast::SharedTickBroadcast;

/// Symbols published when none are configured.
pub const DEFAULT_SYMBOLS: [&str; 5] = ["AAPL", "GOOG", "TSLA", "AMZN", "MSFT"];

/// Default time between publishing rounds.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Simulated Price Source
// =============================================================================

/// Uniformly random prices in `[50.00, 150.00)`, two decimal places.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedPriceSource;

impl SimulatedPriceSource {
    const MIN_CENTS: i64 = 5_000;
    const MAX_CENTS: i64 = 15_000;
}

#[async_trait]
impl PriceSourcePort for SimulatedPriceSource {
    async fn current_price(&self, _symbol: &str) -> Result<Decimal, PriceSourceError> {
        let cents = rand::rng().random_range(Self::MIN_CENTS..Self::MAX_CENTS);
        Ok(Decimal::new(cents, 2))
    }
}

// =============================================================================
// Feed Loop
// =============================================================================

/// Periodic tick producer.
pub struct PriceFeed {
    source: Arc<dyn PriceSourcePort>,
    broadcast: SharedTickBroadcast,
    metrics: SharedMetrics,
    symbols: Vec<String>,
    interval: Duration,
}

impl PriceFeed {
    /// Create a feed over `symbols`.
    #[must_use]
    pub fn new(
        source: Arc<dyn PriceSourcePort>,
        broadcast: SharedTickBroadcast,
        metrics: SharedMetrics,
        symbols: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            broadcast,
            metrics,
            symbols,
            interval,
        }
    }

    /// Publish rounds until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            symbols = ?self.symbols,
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Price feed started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.publish_round().await;
                }
            }
        }

        tracing::info!("Price feed stopped");
    }

    /// Publish one tick per symbol. Returns how many ticks were published.
    pub async fn publish_round(&self) -> usize {
        let mut published = 0;
        for symbol in &self.symbols {
            if self.publish_symbol(symbol).await {
                published += 1;
            }
        }
        published
    }

    async fn publish_symbol(&self, symbol: &str) -> bool {
        let price = match self.source.current_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Failed to fetch price, dropping tick");
                self.metrics.record_tick_dropped(symbol);
                return false;
            }
        };

        let tick = TickEvent::now(symbol, price);
        match self.broadcast.publish(&tick) {
            Ok(receivers) => {
                tracing::trace!(tick_id = %tick.tick_id(), price = %price, receivers, "Tick published");
                true
            }
            Err(e) => {
                tracing::warn!(tick_id = %tick.tick_id(), error = %e, "Failed to publish tick");
                self.metrics.record_tick_dropped(symbol);
                false
            }
        }
    }
}

impl std::fmt::Debug for PriceFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceFeed")
            .field("symbols", &self.symbols)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::infrastructure::broadcast::TickBroadcast;
    use crate::infrastructure::metrics::RecordingMetrics;

    struct FixedPrices(HashMap<String, Decimal>);

    #[async_trait]
    impl PriceSourcePort for FixedPrices {
        async fn current_price(&self, symbol: &str) -> Result<Decimal, PriceSourceError> {
            self.0
                .get(symbol)
                .copied()
                .ok_or_else(|| PriceSourceError::Unavailable {
                    symbol: symbol.to_string(),
                })
        }
    }

    fn feed(
        source: Arc<dyn PriceSourcePort>,
        symbols: &[&str],
    ) -> (PriceFeed, SharedTickBroadcast, Arc<RecordingMetrics>) {
        let broadcast = Arc::new(TickBroadcast::new(64));
        let metrics = Arc::new(RecordingMetrics::default());
        let feed = PriceFeed::new(
            source,
            broadcast.clone(),
            metrics.clone(),
            symbols.iter().map(ToString::to_string).collect(),
            Duration::from_millis(10),
        );
        (feed, broadcast, metrics)
    }

    #[tokio::test]
    async fn simulated_prices_stay_in_range() {
        let source = SimulatedPriceSource;
        for _ in 0..500 {
            let price = source.current_price("AAPL").await.unwrap();
            assert!(price >= Decimal::new(50, 0));
            assert!(price < Decimal::new(150, 0));
            assert!(price.scale() <= 2);
        }
    }

    #[tokio::test]
    async fn round_publishes_one_tick_per_symbol() {
        let (feed, broadcast, _metrics) = feed(Arc::new(SimulatedPriceSource), &DEFAULT_SYMBOLS);
        let mut rx = broadcast.subscribe();

        assert_eq!(feed.publish_round().await, 5);

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(TickEvent::decode(&rx.recv().await.unwrap()).unwrap().symbol);
        }
        assert_eq!(seen, DEFAULT_SYMBOLS);
    }

    #[tokio::test]
    async fn failing_symbol_is_skipped() {
        let prices = FixedPrices(HashMap::from([("AAPL".to_string(), Decimal::new(101, 0))]));
        let (feed, broadcast, metrics) = feed(Arc::new(prices), &["AAPL", "GOOG"]);
        let mut rx = broadcast.subscribe();

        assert_eq!(feed.publish_round().await, 1);

        let tick = TickEvent::decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(tick.symbol, "AAPL");
        assert_eq!(tick.price, Decimal::new(101, 0));
        assert_eq!(metrics.ticks_dropped(), 1);
    }

    #[tokio::test]
    async fn round_without_subscribers_drops_ticks() {
        let (feed, _broadcast, metrics) = feed(Arc::new(SimulatedPriceSource), &["AAPL"]);

        assert_eq!(feed.publish_round().await, 0);
        assert_eq!(metrics.ticks_dropped(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (feed, broadcast, _metrics) = feed(Arc::new(SimulatedPriceSource), &["TSLA"]);
        let mut rx = broadcast.subscribe();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(feed.run(shutdown.clone()));
        let first = rx.recv().await.unwrap();
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(TickEvent::decode(&first).unwrap().symbol, "TSLA");
    }
}
