//! Push-driven source fed by another component, such as the HTTP ingest
//! endpoint receiving `devicemotion` readings from a browser.

use crate::collector::{CollectorError, RawSample, SampleSource};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle used by producers to feed a [`ChannelSource`].
#[derive(Clone)]
pub struct SampleSink {
    sender: Sender<RawSample>,
    running: Arc<AtomicBool>,
}

impl SampleSink {
    /// Forward one sample. Returns `false` when the source is stopped or the
    /// queue is full; the sample is dropped in both cases.
    pub fn send(&self, sample: RawSample) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        match self.sender.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Sample queue full, dropping sample");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// A source whose samples are pushed in through a [`SampleSink`].
pub struct ChannelSource {
    sender: Sender<RawSample>,
    receiver: Receiver<RawSample>,
    running: Arc<AtomicBool>,
}

impl ChannelSource {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(10_000);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Producer handle. Samples sent while the source is stopped are dropped.
    pub fn sink(&self) -> SampleSink {
        SampleSink {
            sender: self.sender.clone(),
            running: self.running.clone(),
        }
    }
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for ChannelSource {
    fn name(&self) -> &'static str {
        "http"
    }

    fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<RawSample> {
        &self.receiver
    }
}
