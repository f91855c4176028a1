//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Tick fan-out over a broadcast channel.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// Periodic price feed and simulated price source.
pub mod feed;

/// Health check, metrics and order intake HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Order persistence adapters.
pub mod persistence;

/// Watch queue backends.
pub mod queue;

/// OpenTelemetry tracing integration.
pub mod telemetry;
