//! Order Intake
//!
//! Records a new order and, when it carries a stop-loss, starts watching it.
//! The order is persisted first so the watch can reference its identifier;
//! the watch then enters the queue with score zero.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    NewOrder, OrderStoreError, OrderStorePort, QueueError, SharedWatchQueue,
};
use crate::domain::codec::CodecError;
use crate::domain::watch::{OrderId, QueueItem, WatchEntry};

/// Stop-loss criteria derivation settings.
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    /// Distance below the entry price at which the stop triggers.
    pub stop_loss_offset: Decimal,
    /// How long a watch stays live.
    pub watch_ttl: Duration,
    /// Symbols the price feed publishes.
    pub known_symbols: Vec<String>,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            stop_loss_offset: Decimal::new(5, 0),
            watch_ttl: Duration::hours(24),
            known_symbols: Vec::new(),
        }
    }
}

/// Order placement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    /// Placing user.
    pub user_id: i64,
    /// Ticker symbol.
    pub symbol: String,
    /// Order quantity.
    pub quantity: Decimal,
    /// Entry price.
    pub price: Decimal,
    /// Whether to watch the order for a stop-loss.
    pub stop_loss: bool,
}

/// Result of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    /// Identifier issued by the order store.
    pub order_id: OrderId,
    /// Watch created for the order, if any.
    pub watch: Option<WatchEntry>,
}

/// Order intake error.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The request failed validation.
    #[error("invalid order: {0}")]
    Invalid(String),

    /// The order could not be persisted.
    #[error("failed to persist order: {0}")]
    Store(#[from] OrderStoreError),

    /// The watch could not be encoded.
    #[error("failed to encode watch: {0}")]
    Codec(#[from] CodecError),

    /// The watch could not be queued.
    #[error("failed to queue watch: {0}")]
    Queue(#[from] QueueError),
}

/// Order intake service.
pub struct OrderIntake {
    store: Arc<dyn OrderStorePort>,
    queue: SharedWatchQueue,
    settings: IntakeSettings,
}

impl OrderIntake {
    /// Create an intake service.
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStorePort>,
        queue: SharedWatchQueue,
        settings: IntakeSettings,
    ) -> Self {
        Self {
            store,
            queue,
            settings,
        }
    }

    /// Persist an order and queue its stop-loss watch.
    ///
    /// The symbol is trimmed and upper-cased so it matches the feed's ticks.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::Invalid` for a malformed request, or the
    /// collaborator error if persisting the order or queueing the watch fails.
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<PlacedOrder, IntakeError> {
        validate(&request)?;
        let symbol = request.symbol.trim().to_uppercase();

        let order_id = self
            .store
            .create_order(NewOrder {
                user_id: request.user_id,
                symbol: symbol.clone(),
                quantity: request.quantity,
                price: request.price,
                stop_loss: request.stop_loss,
            })
            .await?;

        if !request.stop_loss {
            tracing::info!(order_id = %order_id, symbol = %symbol, "Order placed without stop-loss");
            return Ok(PlacedOrder {
                order_id,
                watch: None,
            });
        }

        if !self.settings.known_symbols.is_empty()
            && !self.settings.known_symbols.contains(&symbol)
        {
            // No tick will ever match this watch; it stays queued until removed externally.
            tracing::warn!(symbol = %symbol, "Watching a symbol the price feed does not publish");
        }

        let entry = WatchEntry::new(
            order_id.clone(),
            symbol,
            request.price - self.settings.stop_loss_offset,
            Utc::now()
                .checked_add_signed(self.settings.watch_ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        self.queue.insert(QueueItem::initial(&entry)?).await?;

        tracing::info!(
            order_id = %order_id,
            symbol = %entry.symbol,
            trigger_price = %entry.trigger_price,
            expires_at = %entry.expires_at,
            "Order placed with stop-loss watch"
        );

        Ok(PlacedOrder {
            order_id,
            watch: Some(entry),
        })
    }
}

fn validate(request: &PlaceOrderRequest) -> Result<(), IntakeError> {
    if request.symbol.trim().is_empty() {
        return Err(IntakeError::Invalid("symbol is required".to_string()));
    }
    if request.quantity <= Decimal::ZERO {
        return Err(IntakeError::Invalid("quantity must be positive".to_string()));
    }
    if request.price <= Decimal::ZERO {
        return Err(IntakeError::Invalid("price must be positive".to_string()));
    }
    Ok(())
}

impl std::fmt::Debug for OrderIntake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderIntake")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
