#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Stop-Loss Engine - Tick-Driven Order Protection
//!
//! Watches open orders and executes each one the first time a price tick for
//! its symbol prints at or below its stop-loss trigger, unless the watch
//! expires first. A pool of identical workers drains a shared priority queue
//! of watches once per received tick.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Watches, ticks and the stop-loss decision rule
//!   - `watch`: Watch entries and queue items
//!   - `tick`: Price ticks
//!   - `evaluator`: Pure execute / requeue / expire decision
//!   - `codec`: Flat JSON records for queue and broadcast payloads
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Watch queue, order store, price source, metrics
//!   - `services`: Worker drain loop, execution sink, order intake
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `queue`: In-memory and Redis sorted-set watch queues
//!   - `broadcast`: Tick fan-out channel
//!   - `feed`: Periodic price feed
//!   - `persistence`: In-memory order store
//!   - `config`: Environment configuration
//!   - `health`: Health, metrics and order intake HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!                  ┌───────────┐ tick  ┌──────────┐
//! Price source ──► │ PriceFeed │ ────► │ Broadcast│ ──► Worker 1..N
//!                  └───────────┘       └──────────┘        │  ▲
//!                                                 pop_min  │  │ reinsert
//!                                                          ▼  │
//! POST /api/place-order ──► OrderIntake ──insert──► Watch Queue
//!                                                          │
//!                                           Execute ──► ExecutionSink ──► Order store
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core stop-loss types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::codec::{CodecError, PayloadKind};
pub use domain::evaluator::{Decision, evaluate};
pub use domain::tick::{TickEvent, TickPayload};
pub use domain::watch::{OrderId, QueueItem, WatchEntry};

// Ports
pub use application::ports::{
    DrainPassSummary, EngineMetrics, ExecutionOutcome, NewOrder, OrderStoreError, OrderStorePort,
    PriceSourceError, PriceSourcePort, QueueError, SharedMetrics, SharedWatchQueue,
    WatchQueuePort,
};

// Services
pub use application::services::{
    DrainOutcome, DrainStop, ExecutionError, ExecutionSink, IntakeError, IntakeSettings,
    OrderIntake, PlaceOrderRequest, PlacedOrder, Worker, WorkerConfig,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, EngineConfig, QueueBackend};

// Adapters
pub use infrastructure::broadcast::{PublishError, SharedTickBroadcast, TickBroadcast};
pub use infrastructure::feed::{PriceFeed, SimulatedPriceSource};
pub use infrastructure::persistence::{InMemoryOrderStore, OrderStatus};
pub use infrastructure::queue::{InMemoryWatchQueue, RedisWatchQueue};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::{PrometheusMetrics, RecordingMetrics, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
