//! Ring buffer that turns a sample stream into fixed-size overlapping windows.
//!
//! The first window is emitted once 128 samples have arrived. After that a
//! window is emitted every 64 new samples, so consecutive windows share half
//! their rows. The ring is capped at three windows worth of samples; on
//! overflow it is trimmed back to the most recent 128.

use crate::collector::types::{values_from_json, Sample};
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::ops::Index;

/// Number of samples in every emitted window.
pub const WINDOW_SIZE: usize = 128;

/// New samples required between emissions after the first one.
pub const OVERLAP_SHIFT: usize = 64;

/// Hard cap on the ring length.
pub const MAX_BUFFER_LEN: usize = WINDOW_SIZE * 3;

/// An immutable snapshot of exactly [`WINDOW_SIZE`] samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    samples: Vec<Sample>,
}

impl Window {
    fn from_tail(ring: &VecDeque<Sample>) -> Self {
        let skip = ring.len() - WINDOW_SIZE;
        Self {
            samples: ring.iter().skip(skip).copied().collect(),
        }
    }

    /// Number of rows (always [`WINDOW_SIZE`]).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Windows are never empty; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Rows as plain arrays, the shape the classifier expects.
    pub fn rows(&self) -> Vec<[f64; 6]> {
        self.samples.iter().map(|s| s.0).collect()
    }

    /// Build a window from exactly [`WINDOW_SIZE`] samples.
    pub fn from_samples(samples: Vec<Sample>) -> Option<Self> {
        (samples.len() == WINDOW_SIZE).then_some(Self { samples })
    }
}

impl Index<usize> for Window {
    type Output = Sample;

    fn index(&self, index: usize) -> &Sample {
        &self.samples[index]
    }
}

impl Serialize for Window {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.samples.serialize(serializer)
    }
}

/// Accumulates samples and hands completed windows to a consumer callback.
pub struct WindowBuffer<F>
where
    F: FnMut(Window),
{
    /// Accepted samples, oldest first
    ring: VecDeque<Sample>,
    /// Samples accepted since the last emission
    samples_since_emit: usize,
    /// Whether at least one window has been emitted since creation or reset
    has_emitted: bool,
    /// Invoked synchronously with every completed window
    on_window: F,
}

impl<F> WindowBuffer<F>
where
    F: FnMut(Window),
{
    /// Create an empty buffer that calls `on_window` for each completed window.
    pub fn new(on_window: F) -> Self {
        Self {
            ring: VecDeque::with_capacity(MAX_BUFFER_LEN + 1),
            samples_since_emit: 0,
            has_emitted: false,
            on_window,
        }
    }

    /// Push one sample.
    ///
    /// Input that is not exactly six numbers is dropped without touching any
    /// state. Returns whether the sample was accepted.
    pub fn push(&mut self, sample: impl AsRef<[f64]>) -> bool {
        let Some(sample) = Sample::from_slice(sample.as_ref()) else {
            return false;
        };

        self.ring.push_back(sample);
        self.samples_since_emit += 1;

        if self.ring.len() > MAX_BUFFER_LEN {
            let excess = self.ring.len() - WINDOW_SIZE;
            self.ring.drain(..excess);
        }

        let threshold = if self.has_emitted {
            OVERLAP_SHIFT
        } else {
            WINDOW_SIZE
        };

        if self.ring.len() >= WINDOW_SIZE && self.samples_since_emit >= threshold {
            let window = Window::from_tail(&self.ring);
            self.samples_since_emit = 0;
            self.has_emitted = true;
            (self.on_window)(window);
        }

        true
    }

    /// Push a sample in its JSON wire form. Non-arrays and arrays with
    /// non-numeric members are dropped like any other malformed sample.
    pub fn push_value(&mut self, value: &serde_json::Value) -> bool {
        match values_from_json(value) {
            Some(values) => self.push(values),
            None => false,
        }
    }

    /// Push samples in order. Returns how many were accepted.
    pub fn push_batch<I>(&mut self, samples: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<[f64]>,
    {
        samples
            .into_iter()
            .map(|sample| self.push(sample))
            .filter(|accepted| *accepted)
            .count()
    }

    /// Copy of the current ring contents, oldest first.
    pub fn buffer(&self) -> Vec<Sample> {
        self.ring.iter().copied().collect()
    }

    /// The most recent full window, if the ring holds one.
    pub fn latest_window(&self) -> Option<Window> {
        (self.ring.len() >= WINDOW_SIZE).then(|| Window::from_tail(&self.ring))
    }

    /// Fill level relative to one window, clamped to 100.
    pub fn fill_percent(&self) -> u8 {
        let percent = (self.ring.len() as f64 / WINDOW_SIZE as f64 * 100.0).round();
        percent.min(100.0) as u8
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn samples_since_emit(&self) -> usize {
        self.samples_since_emit
    }

    pub fn has_emitted(&self) -> bool {
        self.has_emitted
    }

    /// Return to the freshly constructed state.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.samples_since_emit = 0;
        self.has_emitted = false;
    }
}
