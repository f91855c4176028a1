//! HTTP Intake Integration Tests
//!
//! Places orders through the HTTP router and lets a worker drain them.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use stop_loss_engine::infrastructure::health::router;
use stop_loss_engine::{
    DrainStop, ExecutionSink, HealthServerState, InMemoryOrderStore, InMemoryWatchQueue,
    IntakeSettings, OrderId, OrderIntake, RecordingMetrics, SharedWatchQueue, TickBroadcast,
    TickEvent, WatchQueuePort, Worker, WorkerConfig,
};

struct Fixture {
    app: axum::Router,
    store: Arc<InMemoryOrderStore>,
    queue: SharedWatchQueue,
    worker: Worker,
    broadcast: Arc<TickBroadcast>,
}

fn fixture() -> Fixture {
    let queue: SharedWatchQueue = Arc::new(InMemoryWatchQueue::new());
    let store = Arc::new(InMemoryOrderStore::new());
    let metrics = Arc::new(RecordingMetrics::default());
    let broadcast = Arc::new(TickBroadcast::default());
    let intake = Arc::new(OrderIntake::new(
        store.clone(),
        queue.clone(),
        IntakeSettings {
            known_symbols: vec!["AAPL".to_string()],
            ..IntakeSettings::default()
        },
    ));
    let sink = Arc::new(ExecutionSink::new(store.clone(), metrics.clone()));
    let worker = Worker::new(
        WorkerConfig::numbered(1, 40),
        queue.clone(),
        sink,
        metrics.clone(),
    );
    let state = Arc::new(HealthServerState::new(
        "test".to_string(),
        1,
        queue.clone(),
        broadcast.clone(),
        intake,
        metrics,
    ));

    Fixture {
        app: router(state),
        store,
        queue,
        worker,
        broadcast,
    }
}

async fn post_order(app: &axum::Router, body: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/place-order")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn placed_order_executes_when_price_falls() {
    let f = fixture();

    let (status, json) = post_order(
        &f.app,
        r#"{"user_id":3,"symbol":"AAPL","quantity":1,"price":100,"stop_loss":true}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = OrderId::new(json["order_id"].as_str().unwrap());
    assert_eq!(f.queue.len().await.unwrap(), 1);

    let outcome = f
        .worker
        .drain(
            &TickEvent::now("AAPL", Decimal::new(9_450, 2)),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.stop, DrainStop::Exhausted);
    assert_eq!(outcome.summary.executed, 1);
    assert!(f.store.is_executed(&order_id));
}

#[tokio::test]
async fn order_without_stop_loss_is_stored_only() {
    let f = fixture();

    let (status, json) = post_order(
        &f.app,
        r#"{"user_id":3,"symbol":"AAPL","quantity":1,"price":100,"stop_loss":false}"#,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(json["watch"].is_null());
    assert_eq!(f.store.len(), 1);
    assert!(f.queue.is_empty().await.unwrap());
}

#[tokio::test]
async fn non_positive_quantity_is_rejected() {
    let f = fixture();

    let (status, json) = post_order(
        &f.app,
        r#"{"user_id":3,"symbol":"AAPL","quantity":0,"price":100,"stop_loss":true}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("quantity"));
    assert!(f.store.is_empty());
}

#[tokio::test]
async fn health_reports_queue_depth_and_subscribers() {
    let f = fixture();
    let _rx = f.broadcast.subscribe();
    post_order(
        &f.app,
        r#"{"user_id":3,"symbol":"AAPL","quantity":1,"price":100,"stop_loss":true}"#,
    )
    .await;

    let response = f
        .app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["queue"]["depth"], 1);
    assert_eq!(json["workers"]["subscribed"], 1);
}

#[tokio::test]
async fn liveness_is_always_ok() {
    let f = fixture();

    let response = f
        .app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
