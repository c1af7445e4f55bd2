//! Accumulates classifier results into per-session statistics.
//!
//! Durations are credited to the activity that was current while time
//! passed: each prediction credits the previous label with the time since
//! the last prediction or tick, and the 1 Hz ticker credits the current
//! label with one second.

use crate::classifier::PredictionResult;
use crate::collector::types::Activity;
use crate::core::calories::{total_calories, DEFAULT_WEIGHT_KG};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Maximum number of timeline entries kept.
pub const TIMELINE_CAPACITY: usize = 100;

/// Number of recent confidence and latency values kept for summary statistics.
pub const SERIES_CAPACITY: usize = 1_000;

/// A change of activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub activity: Activity,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view of the aggregator, for display and export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub activity: Option<Activity>,
    pub confidence: f64,
    pub inference_ms: Option<f64>,
    pub probabilities: HashMap<String, f64>,
    pub durations: HashMap<Activity, f64>,
    pub timeline: Vec<TimelineEntry>,
    pub prediction_count: u64,
    pub weight_kg: f64,
    pub total_calories: f64,
    pub session_start: DateTime<Utc>,
}

/// Running per-session activity statistics.
#[derive(Debug)]
pub struct SessionAggregator {
    activity: Option<Activity>,
    confidence: f64,
    inference_ms: Option<f64>,
    probabilities: HashMap<String, f64>,
    durations: HashMap<Activity, f64>,
    timeline: VecDeque<TimelineEntry>,
    /// When durations were last credited
    last_activity_time: Option<Instant>,
    prediction_count: u64,
    /// Confidence of the most recent predictions, for summary statistics
    confidences: VecDeque<f64>,
    /// Inference latency of the most recent predictions
    latencies_ms: VecDeque<f64>,
    weight_kg: f64,
    session_start: DateTime<Utc>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::with_weight(DEFAULT_WEIGHT_KG)
    }

    /// Create an aggregator using `weight_kg` for calorie estimates.
    pub fn with_weight(weight_kg: f64) -> Self {
        Self {
            activity: None,
            confidence: 0.0,
            inference_ms: None,
            probabilities: HashMap::new(),
            durations: HashMap::new(),
            timeline: VecDeque::with_capacity(TIMELINE_CAPACITY),
            last_activity_time: None,
            prediction_count: 0,
            confidences: VecDeque::with_capacity(SERIES_CAPACITY),
            latencies_ms: VecDeque::with_capacity(SERIES_CAPACITY),
            weight_kg,
            session_start: Utc::now(),
        }
    }

    /// Apply a prediction received now.
    pub fn record_prediction(&mut self, result: PredictionResult) {
        self.record_prediction_at(result, Instant::now());
    }

    /// Apply a prediction received at `now`.
    pub fn record_prediction_at(&mut self, result: PredictionResult, now: Instant) {
        if let (Some(previous), Some(last)) = (self.activity, self.last_activity_time) {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            *self.durations.entry(previous).or_insert(0.0) += elapsed;
        }

        if self.activity != Some(result.activity) {
            if self.timeline.len() == TIMELINE_CAPACITY {
                self.timeline.pop_front();
            }
            self.timeline.push_back(TimelineEntry {
                activity: result.activity,
                confidence: result.confidence,
                timestamp: Utc::now(),
            });
        }

        self.activity = Some(result.activity);
        self.confidence = result.confidence;
        self.inference_ms = Some(result.inference_ms);
        self.probabilities = result.probabilities;
        self.last_activity_time = Some(now);
        self.prediction_count += 1;
        push_bounded(&mut self.confidences, result.confidence);
        push_bounded(&mut self.latencies_ms, result.inference_ms);
    }

    /// 1 Hz tick: credit the current activity with one second.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        let Some(activity) = self.activity else {
            return;
        };
        if self.last_activity_time.is_none() {
            return;
        }
        *self.durations.entry(activity).or_insert(0.0) += 1.0;
        self.last_activity_time = Some(now);
    }

    pub fn set_weight(&mut self, weight_kg: f64) {
        self.weight_kg = weight_kg;
    }

    pub fn activity(&self) -> Option<Activity> {
        self.activity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn inference_ms(&self) -> Option<f64> {
        self.inference_ms
    }

    pub fn prediction_count(&self) -> u64 {
        self.prediction_count
    }

    pub fn durations(&self) -> &HashMap<Activity, f64> {
        &self.durations
    }

    /// Seconds credited to `activity` so far.
    pub fn duration_of(&self, activity: Activity) -> f64 {
        self.durations.get(&activity).copied().unwrap_or(0.0)
    }

    pub fn timeline(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.timeline.iter()
    }

    pub fn timeline_len(&self) -> usize {
        self.timeline.len()
    }

    pub fn total_calories(&self) -> f64 {
        total_calories(&self.durations, self.weight_kg)
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    /// Confidences of up to the last [`SERIES_CAPACITY`] predictions, oldest first.
    pub fn confidences(&self) -> impl Iterator<Item = f64> + '_ {
        self.confidences.iter().copied()
    }

    pub fn latencies_ms(&self) -> impl Iterator<Item = f64> + '_ {
        self.latencies_ms.iter().copied()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            activity: self.activity,
            confidence: self.confidence,
            inference_ms: self.inference_ms,
            probabilities: self.probabilities.clone(),
            durations: self.durations.clone(),
            timeline: self.timeline.iter().cloned().collect(),
            prediction_count: self.prediction_count,
            weight_kg: self.weight_kg,
            total_calories: self.total_calories(),
            session_start: self.session_start,
        }
    }
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded(series: &mut VecDeque<f64>, value: f64) {
    if series.len() == SERIES_CAPACITY {
        series.pop_front();
    }
    series.push_back(value);
}

/// Aggregator shared between the session loop and dispatch tasks.
pub type SharedAggregator = Arc<Mutex<SessionAggregator>>;
