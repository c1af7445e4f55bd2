//! Integration tests for the classifier client against an in-process service

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use har_stream_agent::classifier::{
    ClassifierClient, ClassifierConfig, ClassifierError, HealthStatus,
};
use har_stream_agent::collector::{Activity, Sample};
use har_stream_agent::core::{SessionAggregator, ThrottledDispatcher, Window, WINDOW_SIZE};
use har_stream_agent::pipeline::{classifier_predictor, StreamingSession};
use har_stream_agent::stats::create_shared_stats;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn client_for(url: &str) -> ClassifierClient {
    ClassifierClient::new(ClassifierConfig::new(url)).expect("Failed to build client")
}

fn test_window() -> Window {
    let samples = (0..WINDOW_SIZE)
        .map(|i| Sample::new([i as f64, 0.0, 9.8], [0.0, 0.1, -0.1]))
        .collect();
    Window::from_samples(samples).expect("window of full length")
}

/// Mimics the classifier: validates the input shape like the real service.
async fn predict_handler(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let rows = body["sensor_data"].as_array().cloned().unwrap_or_default();
    let well_formed = rows.len() == 128
        && rows
            .iter()
            .all(|row| row.as_array().map(|r| r.len() == 6).unwrap_or(false));

    if !well_formed {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid input shape"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "activity": "WALKING",
            "activity_index": 0,
            "confidence": 0.91,
            "probabilities": {"WALKING": 0.91, "STANDING": 0.09},
            "inference_ms": 12.5
        })),
    )
}

#[tokio::test]
async fn test_predict_success() {
    let url = serve(Router::new().route("/predict", post(predict_handler))).await;
    let client = client_for(&url);

    let result = client.predict(&test_window()).await.expect("prediction");
    assert_eq!(result.activity, Activity::Walking);
    assert_eq!(result.activity_index, Some(0));
    assert!((result.confidence - 0.91).abs() < 1e-9);
    assert_eq!(result.inference_ms, 12.5);
    assert_eq!(result.probabilities.len(), 2);
}

#[tokio::test]
async fn test_predict_server_error_message() {
    let app = Router::new().route(
        "/predict",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid input shape"})),
            )
        }),
    );
    let client = client_for(&serve(app).await);

    let err = client.predict(&test_window()).await.unwrap_err();
    assert_eq!(
        err,
        ClassifierError::Server {
            status: 400,
            message: "Invalid input shape".to_string(),
        }
    );
}

#[tokio::test]
async fn test_predict_server_error_without_message() {
    let app = Router::new().route(
        "/predict",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let client = client_for(&serve(app).await);

    let err = client.predict(&test_window()).await.unwrap_err();
    assert_eq!(
        err,
        ClassifierError::Server {
            status: 500,
            message: "Server error: 500".to_string(),
        }
    );
}

#[tokio::test]
async fn test_predict_timeout() {
    let app = Router::new().route(
        "/predict",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({}))
        }),
    );
    let url = serve(app).await;
    let client = ClassifierClient::new(
        ClassifierConfig::new(url).with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let err = client.predict(&test_window()).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn test_predict_unreachable_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"));
    let err = client.predict(&test_window()).await.unwrap_err();
    assert!(matches!(err, ClassifierError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn test_health_healthy() {
    let app = Router::new().route(
        "/health",
        get(|| async {
            Json(json!({
                "status": "healthy",
                "model_loaded": true,
                "scaler_loaded": true,
                "service": "har-classifier",
                "version": "1.0.0"
            }))
        }),
    );
    let client = client_for(&serve(app).await);

    let report = client.check_health().await;
    assert!(report.is_healthy());
    assert!(report.model_loaded);
    assert_eq!(report.service.as_deref(), Some("har-classifier"));
}

#[tokio::test]
async fn test_health_degraded_on_503() {
    let app = Router::new().route(
        "/health",
        get(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "model_loaded": false,
                    "scaler_loaded": true
                })),
            )
        }),
    );
    let client = client_for(&serve(app).await);

    let report = client.check_health().await;
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(!report.model_loaded);
    assert!(report.scaler_loaded);
    assert!(!report.is_healthy());
}

#[tokio::test]
async fn test_health_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let report = client_for(&format!("http://{addr}")).check_health().await;
    assert_eq!(report.status, HealthStatus::Unreachable);
    assert!(!report.model_loaded);
    assert!(!report.scaler_loaded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_applies_remote_prediction() {
    let url = serve(Router::new().route("/predict", post(predict_handler))).await;

    let aggregator = Arc::new(Mutex::new(SessionAggregator::new()));
    let stats = create_shared_stats();
    let dispatcher = Arc::new(ThrottledDispatcher::new(
        Duration::ZERO,
        classifier_predictor(client_for(&url)),
    ));
    let mut session = StreamingSession::new(
        dispatcher,
        aggregator.clone(),
        stats.clone(),
        tokio::runtime::Handle::current(),
    );

    for sample in test_window().iter() {
        session.push(sample);
    }

    for _ in 0..500 {
        if stats.snapshot().predictions == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let agg = aggregator.lock().unwrap();
    assert_eq!(agg.prediction_count(), 1);
    assert_eq!(agg.activity(), Some(Activity::Walking));
    assert_eq!(stats.snapshot().dispatches_failed, 0);
}
