//! Sample sources for the HAR stream agent.
//!
//! Every source runs independently of the session loop and delivers raw
//! samples over a bounded channel. Samples are passed on as plain number
//! lists; validating their shape is the window buffer's job.

pub mod channel;
pub mod reader;
pub mod simulated;
pub mod types;

use crossbeam_channel::Receiver;

// Re-export commonly used types
pub use channel::{ChannelSource, SampleSink};
pub use reader::ReaderSource;
pub use simulated::{SimulatedGenerator, SimulatedSource, DEFAULT_SAMPLE_RATE_HZ};
pub use types::{values_from_json, Activity, Sample, SAMPLE_ARITY};

/// A sample as delivered by a source, before shape validation.
pub type RawSample = Vec<f64>;

/// A producer of motion samples.
///
/// After `stop` returns the source sends no further samples.
pub trait SampleSource: Send {
    /// Short identifier used in logs and exports.
    fn name(&self) -> &'static str;

    fn start(&mut self) -> Result<(), CollectorError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Channel the samples arrive on.
    fn receiver(&self) -> &Receiver<RawSample>;
}

/// Errors that can occur when starting a source.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    /// The underlying input was already consumed by a previous run
    Exhausted,
    InvalidRate(f64),
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Source is already running"),
            CollectorError::Exhausted => write!(f, "Source input has already been consumed"),
            CollectorError::InvalidRate(rate) => write!(f, "Invalid sample rate: {rate} Hz"),
        }
    }
}

impl std::error::Error for CollectorError {}
