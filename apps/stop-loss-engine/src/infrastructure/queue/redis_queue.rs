//! Redis Watch Queue
//!
//! Backs the watch queue with a Redis sorted set so several engine processes
//! can share it. `ZPOPMIN key count` is atomic on the server, which gives
//! the single-holder guarantee across processes as well as tasks.
//!
//! Requires Redis 5.0 or later.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::application::ports::{QueueError, WatchQueuePort};
use crate::domain::watch::QueueItem;

/// Sorted set key used when none is configured.
pub const DEFAULT_QUEUE_KEY: &str = "orderset";

/// Watch queue stored in a Redis sorted set.
#[derive(Clone)]
pub struct RedisWatchQueue {
    conn: MultiplexedConnection,
    key: String,
}

impl RedisWatchQueue {
    /// Connect to Redis at `url` and use the sorted set at `key`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Unavailable` if the URL is invalid or the
    /// connection cannot be established.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;
        Ok(Self::with_connection(conn, key))
    }

    /// Use an existing connection.
    #[must_use]
    pub fn with_connection(conn: MultiplexedConnection, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }

    /// Sorted set key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl WatchQueuePort for RedisWatchQueue {
    async fn insert(&self, item: QueueItem) -> Result<(), QueueError> {
        let score = score_to_f64(item.score)?;
        redis::cmd("ZADD")
            .arg(&self.key)
            .arg(score)
            .arg(&item.payload)
            .query_async::<_, ()>(&mut self.conn.clone())
            .await
            .map_err(unavailable)
    }

    async fn pop_min_batch(&self, max: usize) -> Result<Vec<QueueItem>, QueueError> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let popped: Vec<(String, String)> = redis::cmd("ZPOPMIN")
            .arg(&self.key)
            .arg(max)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(unavailable)?;

        Ok(popped
            .into_iter()
            .map(|(payload, score)| QueueItem {
                score: parse_score(&score),
                payload,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        redis::cmd("ZCARD")
            .arg(&self.key)
            .query_async::<_, usize>(&mut self.conn.clone())
            .await
            .map_err(unavailable)
    }
}

impl std::fmt::Debug for RedisWatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWatchQueue")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::needless_pass_by_value)]
fn unavailable(error: redis::RedisError) -> QueueError {
    QueueError::Unavailable {
        message: error.to_string(),
    }
}

fn score_to_f64(score: Decimal) -> Result<f64, QueueError> {
    score
        .to_f64()
        .filter(|value| value.is_finite())
        .ok_or_else(|| QueueError::UnrepresentableScore {
            score: score.to_string(),
        })
}

/// Redis returns scores as double-formatted strings, possibly in exponent
/// notation and carrying binary noise (`101.37000000000001`). The reply is
/// read back as a double and re-rendered at its shortest round-trip form,
/// which restores any score of up to 15 significant digits exactly. The
/// score is only an ordering hint, so an unreadable one falls back to zero
/// rather than losing the item.
fn parse_score(raw: &str) -> Decimal {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .and_then(|value| value.to_string().parse::<Decimal>().ok())
        .map_or_else(|| raw.parse::<Decimal>(), Ok)
        .or_else(|_| Decimal::from_scientific(raw))
        .unwrap_or_else(|_| {
            tracing::warn!(score = raw, "Unreadable watch score, using zero");
            Decimal::ZERO
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_scores() {
        assert_eq!(parse_score("0"), Decimal::ZERO);
        assert_eq!(parse_score("110"), Decimal::new(110, 0));
        assert_eq!(parse_score("95.5"), Decimal::new(955, 1));
    }

    #[test]
    fn parses_exponent_scores() {
        assert_eq!(parse_score("1.5e3"), Decimal::new(1500, 0));
    }

    #[test]
    fn unreadable_score_falls_back_to_zero() {
        assert_eq!(parse_score("inf"), Decimal::ZERO);
    }

    #[test]
    fn strips_double_noise_from_scores() {
        assert_eq!(parse_score("101.37000000000001"), Decimal::new(10_137, 2));
        assert_eq!(parse_score("0.069999999999999993"), Decimal::new(7, 2));
    }

    #[test]
    fn stored_scores_read_back_exactly() {
        for score in [
            Decimal::new(10_137, 2),
            Decimal::new(7, 2),
            Decimal::new(123_456_789, 3),
            Decimal::new(9_999_999, 2),
            Decimal::new(-4_205, 1),
        ] {
            let reply = format!("{:.16e}", score_to_f64(score).unwrap());
            assert_eq!(parse_score(&reply), score, "reply {reply}");
        }
    }

    #[test]
    fn converts_scores_for_zadd() {
        let value = score_to_f64(Decimal::new(10_125, 2)).unwrap();
        assert!((value - 101.25).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_url_is_unavailable() {
        let err = redis::Client::open("not a url").map_err(unavailable).unwrap_err();
        assert!(matches!(err, QueueError::Unavailable { .. }));
    }
}
