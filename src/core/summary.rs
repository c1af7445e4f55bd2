//! End-of-session summary export.
//!
//! A summary captures everything the aggregator derived over one session
//! plus descriptive statistics of classifier confidence and latency.

use crate::collector::types::Activity;
use crate::core::session::{SessionAggregator, TimelineEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use uuid::Uuid;

/// The name of this producer.
pub const PRODUCER_NAME: &str = "har-stream-agent";

/// Mean and spread of a series of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesStats {
    /// Describe `values`; `None` for an empty series.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let std_dev = if values.len() > 1 {
            values.iter().std_dev()
        } else {
            0.0
        };
        Some(Self {
            count: values.len(),
            mean: values.iter().mean(),
            std_dev,
            min: Statistics::min(values.iter()),
            max: Statistics::max(values.iter()),
        })
    }
}

/// Exported record of one streaming session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub producer: String,
    pub producer_version: String,
    pub device_id: String,
    /// Source the samples came from (`simulated`, `stdin`, `http`)
    pub source: String,
    pub started_at_utc: String,
    pub ended_at_utc: String,
    pub timezone: String,
    pub prediction_count: u64,
    pub durations_secs: HashMap<Activity, f64>,
    pub weight_kg: f64,
    pub total_calories: f64,
    pub timeline: Vec<TimelineEntry>,
    /// Statistics over the most recent predictions, see `SERIES_CAPACITY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<SeriesStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_ms: Option<SeriesStats>,
}

/// Builds summaries with a stable device identifier.
pub struct SummaryBuilder {
    device_id: String,
    timezone: chrono_tz::Tz,
}

impl SummaryBuilder {
    pub fn new(timezone: chrono_tz::Tz) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            device_id: format!("har-{hostname}"),
            timezone,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Summarize the aggregator state as of `ended_at`.
    pub fn build(
        &self,
        aggregator: &SessionAggregator,
        source: &str,
        ended_at: DateTime<Utc>,
    ) -> SessionSummary {
        SessionSummary {
            session_id: Uuid::new_v4().to_string(),
            producer: PRODUCER_NAME.to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            device_id: self.device_id.clone(),
            source: source.to_string(),
            started_at_utc: aggregator.session_start().to_rfc3339(),
            ended_at_utc: ended_at.to_rfc3339(),
            timezone: self.timezone.to_string(),
            prediction_count: aggregator.prediction_count(),
            durations_secs: aggregator.durations().clone(),
            weight_kg: aggregator.weight_kg(),
            total_calories: aggregator.total_calories(),
            timeline: aggregator.timeline().cloned().collect(),
            confidence: SeriesStats::from_values(&aggregator.confidences().collect::<Vec<_>>()),
            inference_ms: SeriesStats::from_values(&aggregator.latencies_ms().collect::<Vec<_>>()),
        }
    }

    /// Timeline rendered in the configured timezone, one line per entry.
    pub fn format_timeline(&self, aggregator: &SessionAggregator) -> Vec<String> {
        aggregator
            .timeline()
            .map(|entry| {
                format!(
                    "{} {:<18} {:>5.1}%",
                    entry.timestamp.with_timezone(&self.timezone).format("%H:%M:%S"),
                    entry.activity.display_name(),
                    entry.confidence * 100.0
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PredictionResult;
    use std::time::{Duration, Instant};

    fn prediction(activity: Activity, confidence: f64, inference_ms: f64) -> PredictionResult {
        PredictionResult {
            activity,
            activity_index: None,
            confidence,
            inference_ms,
            probabilities: HashMap::new(),
        }
    }

    #[test]
    fn test_series_stats() {
        assert!(SeriesStats::from_values(&[]).is_none());

        let single = SeriesStats::from_values(&[4.0]).unwrap();
        assert_eq!(single.std_dev, 0.0);
        assert_eq!(single.mean, 4.0);

        let stats = SeriesStats::from_values(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.std_dev - 1.0).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn test_build_summary() {
        let mut agg = SessionAggregator::with_weight(70.0);
        let t0 = Instant::now();
        agg.record_prediction_at(prediction(Activity::Walking, 0.8, 10.0), t0);
        agg.record_prediction_at(prediction(Activity::Sitting, 0.6, 30.0), t0 + Duration::from_secs(60));

        let builder = SummaryBuilder::new(chrono_tz::Tz::UTC);
        let summary = builder.build(&agg, "simulated", Utc::now());

        assert_eq!(summary.producer, PRODUCER_NAME);
        assert_eq!(summary.prediction_count, 2);
        assert_eq!(summary.timeline.len(), 2);
        assert_eq!(summary.timezone, "UTC");
        assert!(summary.device_id.starts_with("har-"));
        assert!((summary.durations_secs[&Activity::Walking] - 60.0).abs() < 1e-9);
        assert!((summary.inference_ms.unwrap().mean - 20.0).abs() < 1e-9);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["durations_secs"]["WALKING"].is_number());
    }

    #[test]
    fn test_format_timeline() {
        let mut agg = SessionAggregator::new();
        agg.record_prediction_at(prediction(Activity::Laying, 0.5, 1.0), Instant::now());

        let lines = SummaryBuilder::new(chrono_tz::Europe::Berlin).format_timeline(&agg);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Laying"));
        assert!(lines[0].contains("50.0%"));
    }
}
