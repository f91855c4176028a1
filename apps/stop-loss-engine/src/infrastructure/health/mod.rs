//! Health Check, Metrics and Order Intake Endpoint
//!
//! HTTP endpoint for health checks, Prometheus metrics and order placement.
//! Used by container orchestrators, load balancers, monitoring systems and
//! the order entry frontend.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (queue reachable, workers subscribed)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `POST /api/place-order` - Record an order and start watching its stop-loss

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{SharedMetrics, SharedWatchQueue};
use crate::application::services::{IntakeError, OrderIntake, PlaceOrderRequest};
use crate::infrastructure::broadcast::SharedTickBroadcast;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Engine version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Watch queue status.
    pub queue: QueueStatus,
    /// Worker pool status.
    pub workers: WorkerStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Some workers are gone but ticks are still being drained.
    Degraded,
    /// The queue is unreachable or no worker is listening.
    Unhealthy,
}

/// Watch queue status.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    /// Whether the queue answered.
    pub reachable: bool,
    /// Entries currently queued.
    pub depth: Option<usize>,
    /// Last error, if unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Worker pool status.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    /// Workers started at boot.
    pub configured: usize,
    /// Live tick subscriptions.
    pub subscribed: usize,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    worker_count: usize,
    queue: SharedWatchQueue,
    broadcast: SharedTickBroadcast,
    intake: Arc<OrderIntake>,
    metrics: SharedMetrics,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        worker_count: usize,
        queue: SharedWatchQueue,
        broadcast: SharedTickBroadcast,
        intake: Arc<OrderIntake>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            worker_count,
            queue,
            broadcast,
            intake,
            metrics,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Build the HTTP routes over `state`.
#[must_use]
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/place-order", post(place_order_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state).await;
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state).await;

    if response.queue.reachable && response.workers.subscribed > 0 {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    // Depth is sampled at scrape time rather than on every queue operation.
    if let Ok(depth) = state.queue.len().await {
        state.metrics.set_queue_depth(depth);
    }

    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn place_order_handler(
    State(state): State<Arc<HealthServerState>>,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected order payload");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match state.intake.place_order(request).await {
        Ok(placed) => (StatusCode::CREATED, Json(placed)).into_response(),
        Err(e @ IntakeError::Invalid(_)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Failed to place order");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn error_response(status: StatusCode, error: String) -> axum::response::Response {
    (status, Json(ErrorBody { error })).into_response()
}

async fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let queue = match state.queue.len().await {
        Ok(depth) => QueueStatus {
            reachable: true,
            depth: Some(depth),
            error: None,
        },
        Err(e) => QueueStatus {
            reachable: false,
            depth: None,
            error: Some(e.to_string()),
        },
    };

    let workers = WorkerStatus {
        configured: state.worker_count,
        subscribed: state.broadcast.subscriber_count(),
    };

    HealthResponse {
        status: determine_health_status(&queue, &workers),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        queue,
        workers,
    }
}

fn determine_health_status(queue: &QueueStatus, workers: &WorkerStatus) -> HealthStatus {
    if !queue.reachable || workers.subscribed == 0 {
        HealthStatus::Unhealthy
    } else if workers.subscribed < workers.configured {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::application::services::IntakeSettings;
    use crate::infrastructure::broadcast::TickBroadcast;
    use crate::infrastructure::metrics::RecordingMetrics;
    use crate::infrastructure::persistence::InMemoryOrderStore;
    use crate::infrastructure::queue::InMemoryWatchQueue;

    fn state(broadcast: SharedTickBroadcast, worker_count: usize) -> Arc<HealthServerState> {
        let queue: SharedWatchQueue = Arc::new(InMemoryWatchQueue::new());
        let store = Arc::new(InMemoryOrderStore::new());
        let metrics = Arc::new(RecordingMetrics::default());
        let intake = Arc::new(OrderIntake::new(
            store,
            queue.clone(),
            IntakeSettings::default(),
        ));
        Arc::new(HealthServerState::new(
            "test".to_string(),
            worker_count,
            queue,
            broadcast,
            intake,
            metrics,
        ))
    }

    fn reachable(depth: usize) -> QueueStatus {
        QueueStatus {
            reachable: true,
            depth: Some(depth),
            error: None,
        }
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn determine_status_all_subscribed() {
        let workers = WorkerStatus {
            configured: 4,
            subscribed: 4,
        };
        assert_eq!(determine_health_status(&reachable(0), &workers), HealthStatus::Healthy);
    }

    #[test]
    fn determine_status_partial() {
        let workers = WorkerStatus {
            configured: 4,
            subscribed: 1,
        };
        assert_eq!(determine_health_status(&reachable(3), &workers), HealthStatus::Degraded);
    }

    #[test]
    fn determine_status_queue_down() {
        let queue = QueueStatus {
            reachable: false,
            depth: None,
            error: Some("connection refused".to_string()),
        };
        let workers = WorkerStatus {
            configured: 4,
            subscribed: 4,
        };
        assert_eq!(determine_health_status(&queue, &workers), HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn readyz_requires_subscribers() {
        let broadcast = Arc::new(TickBroadcast::default());
        let app = router(state(broadcast.clone(), 1));

        let response = app
            .clone()
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let _rx = broadcast.subscribe();
        let response = app
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn place_order_returns_created() {
        let app = router(state(Arc::new(TickBroadcast::default()), 1));
        let body = r#"{"user_id":1,"symbol":"AAPL","quantity":"2","price":"120","stop_loss":true}"#;

        let response = app
            .oneshot(
                Request::post("/api/place-order")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["watch"]["trigger_price"], "115");
    }

    #[tokio::test]
    async fn malformed_order_is_bad_request() {
        let app = router(state(Arc::new(TickBroadcast::default()), 1));

        let response = app
            .oneshot(
                Request::post("/api/place-order")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"symbol\":"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
