//! Engine Configuration Settings
//!
//! Configuration types for the stop-loss engine, loaded from environment variables.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::application::services::{DEFAULT_BATCH_SIZE, IntakeSettings};
use crate::infrastructure::broadcast::DEFAULT_CAPACITY;
use crate::infrastructure::feed::{DEFAULT_SYMBOLS, DEFAULT_TICK_INTERVAL};
use crate::infrastructure::queue::DEFAULT_QUEUE_KEY;

/// Watch queue backend selection.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum QueueBackend {
    /// Process-local sorted set.
    #[default]
    Memory,
    /// Redis sorted set.
    Redis {
        /// Connection URL; may carry credentials.
        url: String,
        /// Sorted set key.
        key: String,
    },
}

impl QueueBackend {
    /// Backend name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis { .. } => "redis",
        }
    }
}

impl std::fmt::Debug for QueueBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::Redis { key, .. } => f
                .debug_struct("Redis")
                .field("url", &"[REDACTED]")
                .field("key", key)
                .finish(),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Watches popped per batch.
    pub batch_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            workers: 8,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Price feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Symbols published every round.
    pub symbols: Vec<String>,
    /// Time between rounds.
    pub tick_interval: Duration,
    /// Per-worker tick buffer.
    pub broadcast_capacity: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(ToString::to_string).collect(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            broadcast_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Stop-loss derivation settings.
#[derive(Debug, Clone)]
pub struct StopLossSettings {
    /// Distance below the entry price at which the stop triggers.
    pub offset: Decimal,
    /// How long a watch stays live.
    pub watch_ttl: Duration,
}

impl Default for StopLossSettings {
    fn default() -> Self {
        Self {
            offset: Decimal::new(5, 0),
            watch_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health, metrics and intake HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8080 }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Worker pool settings.
    pub workers: WorkerSettings,
    /// Price feed settings.
    pub feed: FeedSettings,
    /// Watch queue backend.
    pub queue: QueueBackend,
    /// Stop-loss derivation settings.
    pub stop_loss: StopLossSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is missing, malformed or out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is missing, malformed or out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let workers = WorkerSettings {
            workers: env.usize("STOP_LOSS_WORKERS", WorkerSettings::default().workers),
            batch_size: env.usize("STOP_LOSS_BATCH_SIZE", WorkerSettings::default().batch_size),
        };
        if workers.workers == 0 {
            return Err(ConfigError::Zero("STOP_LOSS_WORKERS".to_string()));
        }
        if workers.batch_size == 0 {
            return Err(ConfigError::Zero("STOP_LOSS_BATCH_SIZE".to_string()));
        }

        let symbols = env.get("STOP_LOSS_SYMBOLS").map_or_else(
            || FeedSettings::default().symbols,
            |raw| {
                raw.split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            },
        );
        if symbols.is_empty() {
            return Err(ConfigError::EmptyValue("STOP_LOSS_SYMBOLS".to_string()));
        }

        let feed = FeedSettings {
            symbols,
            tick_interval: env.duration_millis(
                "STOP_LOSS_TICK_INTERVAL_MS",
                FeedSettings::default().tick_interval,
            ),
            broadcast_capacity: env.usize(
                "STOP_LOSS_BROADCAST_CAPACITY",
                FeedSettings::default().broadcast_capacity,
            ),
        };
        if feed.tick_interval.is_zero() {
            return Err(ConfigError::Zero("STOP_LOSS_TICK_INTERVAL_MS".to_string()));
        }

        let queue = match env
            .get("STOP_LOSS_QUEUE_BACKEND")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            None | Some("memory") => QueueBackend::Memory,
            Some("redis") => {
                let url = env
                    .get("REDIS_URL")
                    .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL".to_string()))?;
                if url.is_empty() {
                    return Err(ConfigError::EmptyValue("REDIS_URL".to_string()));
                }
                QueueBackend::Redis {
                    url,
                    key: env
                        .get("STOP_LOSS_QUEUE_KEY")
                        .unwrap_or_else(|| DEFAULT_QUEUE_KEY.to_string()),
                }
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "STOP_LOSS_QUEUE_BACKEND".to_string(),
                    value: other.to_string(),
                });
            }
        };

        let stop_loss = StopLossSettings {
            offset: env.decimal("STOP_LOSS_OFFSET", StopLossSettings::default().offset)?,
            watch_ttl: env.duration_secs(
                "STOP_LOSS_WATCH_TTL_SECS",
                StopLossSettings::default().watch_ttl,
            ),
        };
        if stop_loss.offset.is_sign_negative() {
            return Err(ConfigError::InvalidValue {
                key: "STOP_LOSS_OFFSET".to_string(),
                value: stop_loss.offset.to_string(),
            });
        }

        let server = ServerSettings {
            health_port: env.u16("STOP_LOSS_HEALTH_PORT", ServerSettings::default().health_port),
        };

        Ok(Self {
            workers,
            feed,
            queue,
            stop_loss,
            server,
        })
    }

    /// Intake settings derived from this configuration.
    #[must_use]
    pub fn intake_settings(&self) -> IntakeSettings {
        IntakeSettings {
            stop_loss_offset: self.stop_loss.offset,
            watch_ttl: chrono::Duration::from_std(self.stop_loss.watch_ttl)
                .unwrap_or(chrono::Duration::MAX),
            known_symbols: self.feed.symbols.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable must be positive.
    #[error("environment variable {0} must be greater than zero")]
    Zero(String),
    /// Environment variable could not be interpreted.
    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string())
    }

    fn u16(&self, key: &str, default: u16) -> u16 {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn usize(&self, key: &str, default: usize) -> usize {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }

    fn decimal(&self, key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
        self.get(key).map_or(Ok(default), |v| {
            v.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: v,
            })
        })
    }
}
