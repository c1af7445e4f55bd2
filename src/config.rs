//! Configuration for the HAR stream agent.

use crate::classifier::{ClassifierConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::collector::DEFAULT_SAMPLE_RATE_HZ;
use crate::core::{DEFAULT_MIN_INTERVAL, DEFAULT_WEIGHT_KG};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the classifier service
    pub classifier_url: String,

    /// Hard timeout for each prediction request
    #[serde(with = "duration_secs_serde")]
    pub request_timeout: Duration,

    /// Minimum spacing between classifier calls
    #[serde(with = "duration_millis_serde")]
    pub min_dispatch_interval: Duration,

    /// Rate of the simulated source
    pub sample_rate_hz: f64,

    /// Body weight used for calorie estimates
    pub weight_kg: f64,

    /// IANA timezone used when printing timelines
    pub timezone: String,

    /// Port for the HTTP ingest server
    pub server_port: u16,

    /// Path for exporting session summaries
    pub export_path: PathBuf,

    /// Path for storing pipeline stats
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("har-stream-agent");

        Self {
            classifier_url: "http://127.0.0.1:5000".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            min_dispatch_interval: DEFAULT_MIN_INTERVAL,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            weight_kg: DEFAULT_WEIGHT_KG,
            timezone: "UTC".to_string(),
            server_port: 8787,
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("har-stream-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sample_rate_hz must be positive, got {}",
                self.sample_rate_hz
            )));
        }
        if !(self.weight_kg.is_finite() && self.weight_kg > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "weight_kg must be positive, got {}",
                self.weight_kg
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request_timeout must be non-zero".to_string()));
        }
        self.tz()?;
        Ok(())
    }

    /// Parsed timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone)))
    }

    pub fn classifier(&self) -> ClassifierConfig {
        ClassifierConfig::new(self.classifier_url.clone()).with_timeout(self.request_timeout)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("pipeline_stats.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole seconds.
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration as milliseconds.
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
