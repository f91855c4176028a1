//! Stop-Loss Engine Binary
//!
//! Starts the price feed, the worker pool and the HTTP endpoint.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin stop-loss-engine
//! ```
//!
//! # Environment Variables
//!
//! - `STOP_LOSS_WORKERS`: Worker count (default: 8)
//! - `STOP_LOSS_BATCH_SIZE`: Watches popped per batch (default: 40)
//! - `STOP_LOSS_TICK_INTERVAL_MS`: Feed interval (default: 1000)
//! - `STOP_LOSS_SYMBOLS`: Comma-separated symbols (default: AAPL,GOOG,TSLA,AMZN,MSFT)
//! - `STOP_LOSS_BROADCAST_CAPACITY`: Per-worker tick buffer (default: 1024)
//! - `STOP_LOSS_QUEUE_BACKEND`: memory | redis (default: memory)
//! - `REDIS_URL`: Redis URL, required for the redis backend
//! - `STOP_LOSS_QUEUE_KEY`: Redis sorted set key (default: orderset)
//! - `STOP_LOSS_OFFSET`: Trigger distance below entry price (default: 5.0)
//! - `STOP_LOSS_WATCH_TTL_SECS`: Watch lifetime (default: 86400)
//! - `STOP_LOSS_HEALTH_PORT`: HTTP port (default: 8080)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: stop-loss-engine)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stop_loss_engine::infrastructure::telemetry;
use stop_loss_engine::{
    EngineConfig, ExecutionSink, HealthServer, HealthServerState, InMemoryOrderStore,
    InMemoryWatchQueue, OrderIntake, PriceFeed, PrometheusMetrics, QueueBackend, RedisWatchQueue,
    SharedMetrics, SharedWatchQueue, SimulatedPriceSource, TickBroadcast, Worker, WorkerConfig,
    init_metrics,
};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let telemetry_guard = telemetry::init();

    tracing::info!(
        otel_export = telemetry_guard.is_exporting(),
        "Starting stop-loss engine"
    );

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics().context("failed to install Prometheus recorder")?;
    let metrics: SharedMetrics = Arc::new(PrometheusMetrics);

    let config = EngineConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let queue: SharedWatchQueue = match &config.queue {
        QueueBackend::Memory => Arc::new(InMemoryWatchQueue::new()),
        QueueBackend::Redis { url, key } => {
            let redis_queue = RedisWatchQueue::connect(url, key.clone())
                .await
                .context("failed to connect to Redis watch queue")?;
            tracing::info!(key = redis_queue.key(), "Connected to Redis watch queue");
            Arc::new(redis_queue)
        }
    };

    let order_store = Arc::new(InMemoryOrderStore::new());
    let broadcast = Arc::new(TickBroadcast::new(config.feed.broadcast_capacity));
    let sink = Arc::new(ExecutionSink::new(order_store.clone(), Arc::clone(&metrics)));
    let intake = Arc::new(OrderIntake::new(
        order_store,
        Arc::clone(&queue),
        config.intake_settings(),
    ));

    // Subscribe every worker before the feed publishes its first round
    let workers: Vec<JoinHandle<()>> = (1..=config.workers.workers)
        .map(|index| {
            let worker = Worker::new(
                WorkerConfig::numbered(index, config.workers.batch_size),
                Arc::clone(&queue),
                Arc::clone(&sink),
                Arc::clone(&metrics),
            );
            tokio::spawn(worker.run(broadcast.subscribe(), shutdown_token.clone()))
        })
        .collect();

    let feed = PriceFeed::new(
        Arc::new(SimulatedPriceSource),
        Arc::clone(&broadcast),
        Arc::clone(&metrics),
        config.feed.symbols.clone(),
        config.feed.tick_interval,
    );
    let feed_handle = tokio::spawn(feed.run(shutdown_token.clone()));

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        config.workers.workers,
        Arc::clone(&queue),
        Arc::clone(&broadcast),
        intake,
        Arc::clone(&metrics),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    let health_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
            health_shutdown.cancel();
        }
    });

    tracing::info!(workers = workers.len(), "Stop-loss engine ready");

    await_shutdown(shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = feed_handle.await;
        futures::future::join_all(workers).await
    })
    .await;

    match drained {
        Ok(results) => {
            let panicked = results.iter().filter(|r| r.is_err()).count();
            if panicked > 0 {
                tracing::error!(panicked, "Workers terminated abnormally");
            }
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "Workers did not stop before the shutdown timeout"
            );
        }
    }

    tracing::info!("Stop-loss engine stopped");
    drop(telemetry_guard);
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        workers = config.workers.workers,
        batch_size = config.workers.batch_size,
        queue_backend = config.queue.as_str(),
        symbols = ?config.feed.symbols,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        tick_interval_ms = u64::try_from(config.feed.tick_interval.as_millis()).unwrap_or(u64::MAX),
        broadcast_capacity = config.feed.broadcast_capacity,
        stop_loss_offset = %config.stop_loss.offset,
        watch_ttl_secs = config.stop_loss.watch_ttl.as_secs(),
        "Engine tuning"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT) or an internal cancellation.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Internal shutdown requested");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
