//! HAR Stream Agent - streams motion-sensor samples to an activity classifier.
//!
//! Six-axis samples (accelerometer + gyroscope) are cut into fixed,
//! overlapping windows. Completed windows are sent to a remote human
//! activity recognition service, at most one request at a time and no more
//! often than a minimum interval. Predictions are folded into a session
//! summary with per-activity durations, a recent timeline and calorie
//! estimates.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         HAR Stream Agent                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐           │
//! │  │   Source    │──▶│ WindowBuffer │──▶│  Dispatcher  │──▶ HTTP   │
//! │  │ (sim/stdin) │   │ (128 / 64)   │   │ (throttled)  │  /predict │
//! │  └─────────────┘   └──────────────┘   └──────────────┘           │
//! │         │                                     │                  │
//! │         ▼                                     ▼                  │
//! │  ┌─────────────┐                      ┌──────────────┐           │
//! │  │  Pipeline   │                      │   Session    │           │
//! │  │   Stats     │                      │  Aggregator  │           │
//! │  └─────────────┘                      └──────────────┘           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use har_stream_agent::core::{Window, WindowBuffer};
//!
//! let mut buffer = WindowBuffer::new(|window: Window| {
//!     println!("window of {} samples", window.len());
//! });
//!
//! for i in 0..128 {
//!     buffer.push([i as f64, 0.0, 9.8, 0.0, 0.0, 0.0]);
//! }
//! ```

pub mod classifier;
pub mod collector;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod stats;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use classifier::{
    ClassifierClient, ClassifierConfig, ClassifierError, HealthReport, HealthStatus,
    PredictionResult,
};
pub use collector::{Activity, CollectorError, Sample, SampleSource};
pub use config::{Config, ConfigError};
pub use core::{
    SessionAggregator, SessionSummary, SummaryBuilder, ThrottledDispatcher, Window, WindowBuffer,
};
pub use pipeline::{run_session, StreamingSession};
pub use stats::{PipelineStats, SharedPipelineStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
