//! Configuration Module
//!
//! Configuration loading for the stop-loss engine.

mod settings;

pub use settings::{
    ConfigError, EngineConfig, FeedSettings, QueueBackend, ServerSettings, StopLossSettings,
    WorkerSettings,
};
