//! Stop-Loss Watches
//!
//! A [`WatchEntry`] is one outstanding stop-loss instruction: execute the
//! order identified by `order_id` once a tick for `symbol` prints at or
//! below `trigger_price`, unless `expires_at` has passed first.
//!
//! Inside the watch queue an entry is stored as a [`QueueItem`]: the encoded
//! entry is the member identity and the score is only an ordering hint.
//! Re-inserting the same payload updates its score in place.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::codec::{self, CodecError, PayloadKind};

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque order identifier owned by the order store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Wrap an identifier issued by the order store.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Watch Entry
// =============================================================================

/// One outstanding stop-loss watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    /// Order to execute when the watch triggers.
    pub order_id: OrderId,
    /// Price threshold: execute when a tick prints at or below it.
    pub trigger_price: Decimal,
    /// Deadline after which the watch is dropped without executing.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    /// Ticker symbol the watch listens to.
    pub symbol: String,
}

impl WatchEntry {
    /// Create a new watch entry.
    #[must_use]
    pub fn new(
        order_id: OrderId,
        symbol: impl Into<String>,
        trigger_price: Decimal,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            trigger_price,
            expires_at,
            symbol: symbol.into(),
        }
    }

    /// Whether the watch has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Encode as a flat queue payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    pub fn encode(&self) -> Result<String, CodecError> {
        codec::encode(PayloadKind::Watch, self)
    }

    /// Decode a queue payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Malformed` if the payload is not a watch record.
    pub fn decode(payload: &str) -> Result<Self, CodecError> {
        codec::decode(PayloadKind::Watch, payload)
    }
}

// =============================================================================
// Queue Item
// =============================================================================

/// Storage unit of the watch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Encoded [`WatchEntry`]; also the item's identity in the queue.
    pub payload: String,
    /// Ordering key. Starts at zero, later holds the last observed price.
    pub score: Decimal,
}

impl QueueItem {
    /// Create an item from an already encoded payload.
    #[must_use]
    pub fn new(payload: impl Into<String>, score: Decimal) -> Self {
        Self {
            payload: payload.into(),
            score,
        }
    }

    /// Encode a freshly placed watch with the initial zero score.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if the entry cannot be serialized.
    pub fn initial(entry: &WatchEntry) -> Result<Self, CodecError> {
        Ok(Self::new(entry.encode()?, Decimal::ZERO))
    }

    /// The same member with a different score.
    #[must_use]
    pub fn with_score(self, score: Decimal) -> Self {
        Self {
            payload: self.payload,
            score,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn sample_entry() -> WatchEntry {
        WatchEntry::new(
            OrderId::new("1"),
            "AAPL",
            Decimal::new(100, 0),
            Utc.timestamp_opt(1_700_003_600, 0).unwrap(),
        )
    }

    #[test]
    fn encodes_flat_record() {
        let payload = sample_entry().encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["order_id"], "1");
        assert_eq!(value["symbol"], "AAPL");
        assert_eq!(value["trigger_price"], "100");
        assert_eq!(value["expires_at"], 1_700_003_600);
    }

    #[test]
    fn decodes_numeric_trigger_price() {
        let entry = WatchEntry::decode(
            r#"{"order_id":"42","trigger_price":95.5,"expires_at":1700000000,"symbol":"TSLA"}"#,
        )
        .unwrap();

        assert_eq!(entry.order_id.as_str(), "42");
        assert_eq!(entry.trigger_price, Decimal::new(955, 1));
        assert_eq!(entry.symbol, "TSLA");
    }

    #[test]
    fn rejects_incomplete_record() {
        let err = WatchEntry::decode(r#"{"order_id":"42","symbol":"TSLA"}"#).unwrap_err();
        assert_eq!(err.kind(), PayloadKind::Watch);
    }

    #[test]
    fn expiry_is_inclusive() {
        let entry = sample_entry();
        assert!(!entry.is_expired_at(entry.expires_at - Duration::seconds(1)));
        assert!(entry.is_expired_at(entry.expires_at));
        assert!(entry.is_expired_at(entry.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn initial_item_has_zero_score() {
        let item = QueueItem::initial(&sample_entry()).unwrap();
        assert_eq!(item.score, Decimal::ZERO);
        assert_eq!(WatchEntry::decode(&item.payload).unwrap(), sample_entry());
    }

    #[test]
    fn with_score_keeps_identity() {
        let item = QueueItem::initial(&sample_entry()).unwrap();
        let payload = item.payload.clone();
        let rescored = item.with_score(Decimal::new(110, 0));

        assert_eq!(rescored.payload, payload);
        assert_eq!(rescored.score, Decimal::new(110, 0));
    }

    #[test]
    fn order_id_display() {
        assert_eq!(OrderId::new("abc").to_string(), "abc");
    }
}
