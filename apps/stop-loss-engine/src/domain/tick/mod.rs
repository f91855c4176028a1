//! Price Ticks
//!
//! One price observation for one symbol at one point in time. Ticks are
//! ephemeral: produced by the feed, fanned out to every worker, never stored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::codec::{self, CodecError, PayloadKind};

/// Encoded tick as carried on the broadcast channel.
pub type TickPayload = Arc<str>;

/// A price observation for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvent {
    /// Ticker symbol.
    pub symbol: String,
    /// Observed price.
    pub price: Decimal,
    /// Generation time (Unix milliseconds on the wire).
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl TickEvent {
    /// Create a tick stamped with the current time.
    #[must_use]
    pub fn now(symbol: impl Into<String>, price: Decimal) -> Self {
        Self::at(symbol, price, Utc::now())
    }

    /// Create a tick with an explicit timestamp.
    #[must_use]
    pub fn at(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
        }
    }

    /// Identity of this tick for logs: `SYMBOL@unix_millis`.
    #[must_use]
    pub fn tick_id(&self) -> String {
        format!("{}@{}", self.symbol, self.timestamp.timestamp_millis())
    }

    /// Encode as a flat broadcast payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    pub fn encode(&self) -> Result<String, CodecError> {
        codec::encode(PayloadKind::Tick, self)
    }

    /// Decode a broadcast payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Malformed` if the payload is not a tick record.
    pub fn decode(payload: &str) -> Result<Self, CodecError> {
        codec::decode(PayloadKind::Tick, payload)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn tick_id_includes_symbol_and_millis() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let tick = TickEvent::at("AAPL", Decimal::new(95, 0), ts);
        assert_eq!(tick.tick_id(), "AAPL@1700000000123");
    }

    #[test]
    fn decodes_flat_record() {
        let tick =
            TickEvent::decode(r#"{"symbol":"GOOG","price":"50.25","timestamp":1700000000000}"#)
                .unwrap();

        assert_eq!(tick.symbol, "GOOG");
        assert_eq!(tick.price, Decimal::new(5025, 2));
        assert_eq!(tick.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn rejects_garbage() {
        let err = TickEvent::decode("price=12").unwrap_err();
        assert_eq!(err.kind(), PayloadKind::Tick);
    }
}
