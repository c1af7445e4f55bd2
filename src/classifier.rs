//! HTTP client for the remote activity classifier.
//!
//! The classifier exposes two endpoints:
//! - `POST /predict` taking `{"sensor_data": [[ax, ay, az, gx, gy, gz]; 128]}`
//! - `GET /health` reporting whether the model and scaler are loaded
//!
//! Predictions fail loudly (timeouts and server errors are distinguishable),
//! health checks never fail: transport problems collapse into an
//! `unreachable` report.

use crate::collector::types::Activity;
use crate::core::windowing::Window;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Hard limit on how long a prediction may take.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Classifier endpoint configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Base URL, e.g. `http://127.0.0.1:5000`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClassifierConfig {
    /// Create a configuration with the default 10 second timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL without a trailing slash.
    pub fn url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.url())
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.url())
    }
}

/// Classifier client error types.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// The HTTP client could not be built
    Config(String),
    /// No response within the request timeout
    Timeout,
    /// Connection or other transport failure
    Network(String),
    /// Non-success response status
    Server { status: u16, message: String },
    /// Response body could not be decoded
    Serialization(String),
}

impl ClassifierError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClassifierError::Timeout)
    }
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::Config(msg) => write!(f, "Classifier config error: {msg}"),
            ClassifierError::Timeout => write!(f, "Prediction request timed out"),
            ClassifierError::Network(msg) => write!(f, "Classifier network error: {msg}"),
            ClassifierError::Server { status, message } => {
                write!(f, "Classifier server error ({status}): {message}")
            }
            ClassifierError::Serialization(msg) => {
                write!(f, "Classifier response error: {msg}")
            }
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifierError::Timeout
        } else if e.is_decode() {
            ClassifierError::Serialization(e.to_string())
        } else {
            ClassifierError::Network(e.to_string())
        }
    }
}

/// Request body for `/predict`.
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    sensor_data: &'a Window,
}

/// Error body returned by the classifier on failure.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// A successful classification of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted label
    pub activity: Activity,
    /// Index of the predicted class, when the service reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_index: Option<u32>,
    /// Probability of the predicted label (0-1)
    pub confidence: f64,
    /// Model inference time on the server
    pub inference_ms: f64,
    /// Probability per label
    #[serde(default)]
    pub probabilities: HashMap<String, f64>,
}

/// Readiness of the classifier service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unreachable,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Health report from `/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub scaler_loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl HealthReport {
    /// Sentinel report used whenever the service cannot be reached.
    pub fn unreachable() -> Self {
        Self {
            status: HealthStatus::Unreachable,
            model_loaded: false,
            scaler_loaded: false,
            service: None,
            version: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Async client for the classifier service. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct ClassifierClient {
    config: ClassifierConfig,
    client: reqwest::Client,
}

impl ClassifierClient {
    /// Create a new classifier client.
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClassifierError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one window.
    pub async fn predict(&self, window: &Window) -> Result<PredictionResult, ClassifierError> {
        let response = self
            .client
            .post(self.config.predict_url())
            .json(&PredictRequest {
                sensor_data: window,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            return Err(ClassifierError::Server {
                status: status.as_u16(),
                message: body
                    .error
                    .unwrap_or_else(|| format!("Server error: {}", status.as_u16())),
            });
        }

        let prediction = response.json::<PredictionResult>().await.map_err(|e| {
            if e.is_timeout() {
                ClassifierError::Timeout
            } else {
                ClassifierError::Serialization(e.to_string())
            }
        })?;

        Ok(prediction)
    }

    /// Check service readiness. Never fails; unreachable services and
    /// unreadable replies yield [`HealthReport::unreachable`].
    pub async fn check_health(&self) -> HealthReport {
        let response = match self
            .client
            .get(self.config.health_url())
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Health check failed: {}", e);
                return HealthReport::unreachable();
            }
        };

        // A degraded service answers 503 with a regular report body.
        match response.json::<HealthReport>().await {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!("Health response unreadable: {}", e);
                HealthReport::unreachable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classifier_config_urls() {
        let config = ClassifierConfig::new("http://127.0.0.1:5000/");
        assert_eq!(config.url(), "http://127.0.0.1:5000");
        assert_eq!(config.predict_url(), "http://127.0.0.1:5000/predict");
        assert_eq!(config.health_url(), "http://127.0.0.1:5000/health");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_prediction_result_decoding() {
        let body = json!({
            "activity": "WALKING",
            "activity_index": 0,
            "confidence": 0.94,
            "probabilities": {"WALKING": 0.94, "SITTING": 0.06},
            "inference_ms": 23.5
        });
        let result: PredictionResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.activity, Activity::Walking);
        assert_eq!(result.activity_index, Some(0));
        assert_eq!(result.probabilities.len(), 2);
    }

    #[test]
    fn test_unrecognized_label_decodes_as_unknown() {
        let body = json!({"activity": "CLASS_7", "confidence": 0.4, "inference_ms": 3.0});
        let result: PredictionResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.activity, Activity::Unknown);
        assert!(result.probabilities.is_empty());
    }

    #[test]
    fn test_health_report_decoding() {
        let body = json!({
            "status": "degraded",
            "model_loaded": false,
            "scaler_loaded": true,
            "service": "HAR Prediction API",
            "version": "1.0.0"
        });
        let report: HealthReport = serde_json::from_value(body).unwrap();
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.scaler_loaded);
        assert!(!report.is_healthy());
        assert_eq!(HealthReport::unreachable().status.to_string(), "unreachable");
    }

    #[test]
    fn test_error_display() {
        let err = ClassifierError::Server {
            status: 400,
            message: "Expected 128 timesteps, got 12.".to_string(),
        };
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("128 timesteps"));
        assert!(ClassifierError::Timeout.is_timeout());
    }
}
