//! Pipeline counters.
//!
//! Tracks what the pipeline did with incoming samples and windows. All
//! counters are atomics so sources, the session loop and dispatch tasks can
//! record into one shared instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current session.
#[derive(Debug)]
pub struct PipelineStats {
    /// Well-formed samples accepted by the window buffer
    samples_accepted: AtomicU64,
    /// Malformed samples dropped
    samples_rejected: AtomicU64,
    /// Windows emitted by the buffer
    windows_emitted: AtomicU64,
    /// Predictions applied to the aggregator
    predictions: AtomicU64,
    /// Dispatch attempts refused by the throttle
    dispatches_skipped: AtomicU64,
    /// Classifier calls that failed
    dispatches_failed: AtomicU64,
    /// Results that arrived after the session ended
    stale_results: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            samples_accepted: AtomicU64::new(0),
            samples_rejected: AtomicU64::new(0),
            windows_emitted: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            dispatches_skipped: AtomicU64::new(0),
            dispatches_failed: AtomicU64::new(0),
            stale_results: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that accumulate on top of a previously saved file.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous pipeline stats: {}", e);
        }

        stats
    }

    pub fn record_sample(&self, accepted: bool) {
        if accepted {
            self.samples_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.samples_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejected(&self, count: u64) {
        self.samples_rejected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_window(&self) {
        self.windows_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prediction(&self) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.dispatches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.dispatches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            windows_emitted: self.windows_emitted.load(Ordering::Relaxed),
            predictions: self.predictions.load(Ordering::Relaxed),
            dispatches_skipped: self.dispatches_skipped.load(Ordering::Relaxed),
            dispatches_failed: self.dispatches_failed.load(Ordering::Relaxed),
            stale_results: self.stale_results.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Samples accepted: {}\n\
             - Samples rejected: {}\n\
             - Windows emitted: {}\n\
             - Predictions applied: {}\n\
             - Dispatches skipped (throttled): {}\n\
             - Dispatches failed: {}\n\
             - Stale results discarded: {}\n\
             - Session duration: {} seconds",
            stats.samples_accepted,
            stats.samples_rejected,
            stats.windows_emitted,
            stats.predictions,
            stats.dispatches_skipped,
            stats.dispatches_failed,
            stats.stale_results,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                samples_accepted: stats.samples_accepted,
                samples_rejected: stats.samples_rejected,
                windows_emitted: stats.windows_emitted,
                predictions: stats.predictions,
                dispatches_skipped: stats.dispatches_skipped,
                dispatches_failed: stats.dispatches_failed,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_accepted
                    .store(persisted.samples_accepted, Ordering::Relaxed);
                self.samples_rejected
                    .store(persisted.samples_rejected, Ordering::Relaxed);
                self.windows_emitted
                    .store(persisted.windows_emitted, Ordering::Relaxed);
                self.predictions.store(persisted.predictions, Ordering::Relaxed);
                self.dispatches_skipped
                    .store(persisted.dispatches_skipped, Ordering::Relaxed);
                self.dispatches_failed
                    .store(persisted.dispatches_failed, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.samples_accepted.store(0, Ordering::Relaxed);
        self.samples_rejected.store(0, Ordering::Relaxed);
        self.windows_emitted.store(0, Ordering::Relaxed);
        self.predictions.store(0, Ordering::Relaxed);
        self.dispatches_skipped.store(0, Ordering::Relaxed);
        self.dispatches_failed.store(0, Ordering::Relaxed);
        self.stale_results.store(0, Ordering::Relaxed);
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub samples_accepted: u64,
    pub samples_rejected: u64,
    pub windows_emitted: u64,
    pub predictions: u64,
    pub dispatches_skipped: u64,
    pub dispatches_failed: u64,
    pub stale_results: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_accepted: u64,
    samples_rejected: u64,
    windows_emitted: u64,
    predictions: u64,
    dispatches_skipped: u64,
    dispatches_failed: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared pipeline stats.
pub type SharedPipelineStats = Arc<PipelineStats>;

pub fn create_shared_stats() -> SharedPipelineStats {
    Arc::new(PipelineStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedPipelineStats {
    Arc::new(PipelineStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_counting() {
        let stats = PipelineStats::new();

        stats.record_sample(true);
        stats.record_sample(true);
        stats.record_sample(false);
        stats.record_rejected(2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.samples_accepted, 2);
        assert_eq!(snapshot.samples_rejected, 3);
    }

    #[test]
    fn test_reset() {
        let stats = PipelineStats::new();
        stats.record_window();
        stats.record_skipped();
        stats.record_failure();
        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.windows_emitted, 0);
        assert_eq!(snapshot.dispatches_skipped, 0);
        assert_eq!(snapshot.dispatches_failed, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("har-stats-{}", uuid::Uuid::new_v4()))
            .join("pipeline_stats.json");

        let stats = PipelineStats::with_persistence(path.clone());
        stats.record_window();
        stats.record_prediction();
        stats.save().unwrap();

        let reloaded = PipelineStats::with_persistence(path.clone());
        let snapshot = reloaded.snapshot();
        assert_eq!(snapshot.windows_emitted, 1);
        assert_eq!(snapshot.predictions, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_summary_format() {
        let summary = PipelineStats::new().summary();
        assert!(summary.contains("Samples accepted"));
        assert!(summary.contains("Dispatches skipped"));
    }
}
