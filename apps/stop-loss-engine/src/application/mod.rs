//! Application Layer - Use cases and port definitions.
//!
//! This layer holds the worker pool, the execution sink and order intake,
//! written against the port interfaces so every backend is swappable.

/// Port interfaces for external systems (queue, persistence, prices, metrics).
pub mod ports;

/// Application services: workers, execution sink, order intake.
pub mod services;
