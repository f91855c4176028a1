//! Price Source Port (Driven Port)
//!
//! Supplies the current price for a symbol on demand. The feed polls it once
//! per symbol per interval.

use async_trait::async_trait;
use rust_decimal::Decimal;

/// Price source error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PriceSourceError {
    /// The source has no price for this symbol.
    #[error("no price available for {symbol}")]
    Unavailable {
        /// The symbol requested.
        symbol: String,
    },

    /// The upstream source failed.
    #[error("price source error: {message}")]
    Upstream {
        /// Error details.
        message: String,
    },
}

/// Port for looking up current prices.
#[async_trait]
pub trait PriceSourcePort: Send + Sync {
    /// Current price for `symbol`.
    async fn current_price(&self, symbol: &str) -> Result<Decimal, PriceSourceError>;
}
