//! Sample and activity types shared by the sources and the windowing core.
//!
//! A sample is exactly six numbers: three linear acceleration axes followed
//! by three rotation-rate axes. Anything else is treated as malformed input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of components in a well-formed sample.
pub const SAMPLE_ARITY: usize = 6;

/// A single 6-axis motion reading `[ax, ay, az, gx, gy, gz]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample(pub [f64; SAMPLE_ARITY]);

impl Sample {
    /// Create a sample from accelerometer and gyroscope triples.
    pub fn new(accel: [f64; 3], gyro: [f64; 3]) -> Self {
        Self([accel[0], accel[1], accel[2], gyro[0], gyro[1], gyro[2]])
    }

    /// Build a sample from a slice, rejecting anything that is not exactly
    /// six components long.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let array: [f64; SAMPLE_ARITY] = values.try_into().ok()?;
        Some(Self(array))
    }

    /// Linear acceleration part.
    pub fn accel(&self) -> [f64; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Rotation-rate part.
    pub fn gyro(&self) -> [f64; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }
}

impl AsRef<[f64]> for Sample {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl From<[f64; SAMPLE_ARITY]> for Sample {
    fn from(values: [f64; SAMPLE_ARITY]) -> Self {
        Self(values)
    }
}

/// Extract the numeric components of a JSON sample.
///
/// Returns `None` for non-arrays and for arrays holding anything other than
/// numbers. Arity is not checked here; the window buffer owns that rule.
pub fn values_from_json(value: &serde_json::Value) -> Option<Vec<f64>> {
    value
        .as_array()?
        .iter()
        .map(serde_json::Value::as_f64)
        .collect()
}

/// Activity labels produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Activity {
    Walking,
    WalkingUpstairs,
    WalkingDownstairs,
    Sitting,
    Standing,
    Laying,
    /// Any label outside the known set
    #[serde(other)]
    Unknown,
}

impl Activity {
    /// All recognized labels, in classifier index order.
    pub const KNOWN: [Activity; 6] = [
        Activity::Walking,
        Activity::WalkingUpstairs,
        Activity::WalkingDownstairs,
        Activity::Sitting,
        Activity::Standing,
        Activity::Laying,
    ];

    /// Wire label, e.g. `WALKING_UPSTAIRS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Walking => "WALKING",
            Activity::WalkingUpstairs => "WALKING_UPSTAIRS",
            Activity::WalkingDownstairs => "WALKING_DOWNSTAIRS",
            Activity::Sitting => "SITTING",
            Activity::Standing => "STANDING",
            Activity::Laying => "LAYING",
            Activity::Unknown => "UNKNOWN",
        }
    }

    /// Short human-friendly label.
    pub fn display_name(&self) -> &'static str {
        match self {
            Activity::Walking => "Walking",
            Activity::WalkingUpstairs => "Upstairs",
            Activity::WalkingDownstairs => "Downstairs",
            Activity::Sitting => "Sitting",
            Activity::Standing => "Standing",
            Activity::Laying => "Laying",
            Activity::Unknown => "Unknown",
        }
    }

    /// Parse a wire label; unrecognized labels map to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        Self::KNOWN
            .iter()
            .copied()
            .find(|a| a.as_str().eq_ignore_ascii_case(label.trim()))
            .unwrap_or(Activity::Unknown)
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
