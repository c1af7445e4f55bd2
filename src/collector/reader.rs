//! Line-oriented source for live sensor bridges.
//!
//! Each line holds one JSON sample, e.g. `[0.1, 9.7, -0.4, 1.2, 0.0, -3.5]`.
//! Lines that are not JSON arrays of numbers are dropped here; arity is left
//! to the window buffer. The source ends when the reader reaches EOF, which
//! disconnects the channel.

use crate::collector::types::values_from_json;
use crate::collector::{CollectorError, RawSample, SampleSource};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a blocked send waits before re-checking whether the source stopped.
const SEND_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Reads samples from any buffered reader on a background thread.
pub struct ReaderSource {
    reader: Option<Box<dyn BufRead + Send>>,
    sender: Option<Sender<RawSample>>,
    receiver: Receiver<RawSample>,
    running: Arc<AtomicBool>,
    dropped_lines: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReaderSource {
    pub fn new<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (sender, receiver) = bounded(10_000);
        Self {
            reader: Some(Box::new(reader)),
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            dropped_lines: Arc::new(AtomicU64::new(0)),
            thread_handle: None,
        }
    }

    /// Read samples from standard input.
    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }

    /// Lines that could not be parsed as a numeric array.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines.load(Ordering::Relaxed)
    }
}

/// Parse one input line. Blank lines yield `None` without counting as
/// malformed; the outer `Option` distinguishes "skip" from "malformed".
fn parse_line(line: &str) -> Option<Option<RawSample>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let parsed = serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|value| values_from_json(&value));
    Some(parsed)
}

/// Send one sample, waiting for queue space only while the source runs.
/// Returns `false` once the sample can no longer be delivered.
fn forward(sender: &Sender<RawSample>, running: &AtomicBool, mut values: RawSample) -> bool {
    loop {
        match sender.send_timeout(values, SEND_RETRY_INTERVAL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(pending)) if running.load(Ordering::SeqCst) => {
                values = pending;
            }
            Err(_) => return false,
        }
    }
}

impl SampleSource for ReaderSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        let (Some(reader), Some(sender)) = (self.reader.take(), self.sender.take()) else {
            return Err(CollectorError::Exhausted);
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let dropped = self.dropped_lines.clone();

        let handle = thread::spawn(move || {
            for line in reader.lines() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("Sample reader failed: {}", e);
                        break;
                    }
                };
                match parse_line(&line) {
                    None => continue,
                    Some(None) => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!("Dropped malformed sample line");
                    }
                    Some(Some(values)) => {
                        if !forward(&sender, &running, values) {
                            break;
                        }
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // A thread blocked on a read cannot be interrupted; only join once it
        // has finished on its own.
        if let Some(handle) = self.thread_handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<RawSample> {
        &self.receiver
    }
}
