//! Watch Queue Adapters
//!
//! - `InMemoryWatchQueue`: process-local sorted set behind one mutex
//! - `RedisWatchQueue`: Redis sorted set shared across processes

mod memory;
mod redis_queue;

pub use memory::InMemoryWatchQueue;
pub use redis_queue::{DEFAULT_QUEUE_KEY, RedisWatchQueue};
