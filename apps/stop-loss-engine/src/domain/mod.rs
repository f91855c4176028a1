//! Domain Layer - Watch entries, ticks and the stop-loss decision rules.
//!
//! Everything here is pure Rust with serialization support and no I/O.
//! The worker pool and adapters in the outer layers build on these types.

/// Flat key/value record encoding shared by ticks and watch entries.
pub mod codec;

/// Pure stop-loss decision logic.
pub mod evaluator;

/// Price observations broadcast by the feed.
pub mod tick;

/// Pending stop-loss watches and their queue representation.
pub mod watch;
