//! HTTP server for receiving motion samples from a browser page.
//!
//! This module provides an HTTP server that:
//! - Accepts batches of `devicemotion` samples via POST /samples
//! - Forwards them into the running session's channel source
//! - Reports the current activity and pipeline counters via GET /status
//!
//! # Architecture
//!
//! ```text
//! Browser page ──→ POST /samples ──→ ChannelSource ──→ session loop ──→ classifier
//!                                                          ↓
//!                                   GET /status ←── [Session Aggregator]
//! ```

use crate::collector::{values_from_json, SampleSink};
use crate::core::session::{SessionSnapshot, SharedAggregator};
use crate::stats::{SharedPipelineStats, StatsSnapshot};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared server state
pub struct ServerState {
    /// Entry point into the session's sample channel
    sink: SampleSink,
    stats: SharedPipelineStats,
    aggregator: SharedAggregator,
}

impl ServerState {
    pub fn new(sink: SampleSink, stats: SharedPipelineStats, aggregator: SharedAggregator) -> Self {
        Self {
            sink,
            stats,
            aggregator,
        }
    }
}

/// Batch of samples posted by a browser page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleBatch {
    /// Each element should be a list of six numbers
    pub samples: Vec<serde_json::Value>,
}

/// Response from the samples endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    /// Samples handed to the session
    pub queued: usize,
    /// Samples that were not lists of numbers
    pub rejected: usize,
    /// Samples lost because the queue was full
    pub dropped: usize,
}

/// Response from the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub receiving: bool,
    pub session: SessionSnapshot,
    pub stats: StatsSnapshot,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /samples
///
/// Samples are forwarded in the order given. Elements that are not numeric
/// lists are counted as rejected; lists of the wrong length are forwarded
/// and rejected by the window buffer.
async fn ingest_samples(
    State(state): State<Arc<ServerState>>,
    Json(batch): Json<SampleBatch>,
) -> Result<Json<IngestResponse>, (StatusCode, Json<ErrorResponse>)> {
    if !state.sink.is_open() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "No session is receiving samples".to_string(),
                code: "NOT_RECEIVING".to_string(),
            }),
        ));
    }

    let mut response = IngestResponse {
        status: "ok".to_string(),
        queued: 0,
        rejected: 0,
        dropped: 0,
    };

    for value in &batch.samples {
        match values_from_json(value) {
            Some(values) => {
                if state.sink.send(values) {
                    response.queued += 1;
                } else {
                    response.dropped += 1;
                }
            }
            None => response.rejected += 1,
        }
    }

    if response.rejected > 0 {
        state.stats.record_rejected(response.rejected as u64);
        tracing::debug!("Rejected {} malformed samples", response.rejected);
    }

    Ok(Json(response))
}

/// GET /status
async fn status(State(state): State<Arc<ServerState>>) -> Json<StatusResponse> {
    let session = state
        .aggregator
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .snapshot();

    Json(StatusResponse {
        receiving: state.sink.is_open(),
        session,
        stats: state.stats.snapshot(),
    })
}

/// Build the router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/samples", post(ingest_samples))
        .route("/status", get(status))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    state: ServerState,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(Arc::new(state));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Sample ingest server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
