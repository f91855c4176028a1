//! Stop-Loss Evaluator
//!
//! Decides what happens to a watch when a tick arrives. The rules are
//! applied in a fixed order:
//!
//! 1. Tick for a different symbol: requeue with the previous score.
//! 2. Watch expired at `now`: drop it without executing.
//! 3. Tick price at or below the trigger: execute.
//! 4. Otherwise: requeue, recording the tick price as the new score.
//!
//! Expiry is only checked against ticks of the watch's own symbol, so a
//! watch is never purged by another symbol's tick cadence.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::watch::WatchEntry;

/// Outcome of evaluating one watch against one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Trigger crossed before expiry; execute and remove the watch.
    Execute,
    /// Tick is irrelevant to this watch; reinsert with the previous score.
    RequeueUnchanged(Decimal),
    /// Still watching; reinsert with the observed price as score.
    RequeueUpdated(Decimal),
    /// Deadline passed; remove the watch without executing.
    Expire,
}

impl Decision {
    /// Score to reinsert with, if the watch stays queued.
    #[must_use]
    pub const fn requeue_score(&self) -> Option<Decimal> {
        match self {
            Self::RequeueUnchanged(score) | Self::RequeueUpdated(score) => Some(*score),
            Self::Execute | Self::Expire => None,
        }
    }

    /// Label used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::RequeueUnchanged(_) => "requeue_unchanged",
            Self::RequeueUpdated(_) => "requeue_updated",
            Self::Expire => "expire",
        }
    }
}

/// Evaluate a watch against a tick.
///
/// `old_score` is the score the watch was popped with; it is handed back
/// untouched when the tick belongs to another symbol.
#[must_use]
pub fn evaluate(
    entry: &WatchEntry,
    old_score: Decimal,
    tick_price: Decimal,
    tick_symbol: &str,
    now: DateTime<Utc>,
) -> Decision {
    if entry.symbol != tick_symbol {
        return Decision::RequeueUnchanged(old_score);
    }

    if entry.is_expired_at(now) {
        return Decision::Expire;
    }

    if tick_price <= entry.trigger_price {
        Decision::Execute
    } else {
        Decision::RequeueUpdated(tick_price)
    }
}

// =============================================================================
// Tests
// =============================================================================
