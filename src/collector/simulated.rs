//! Synthetic motion source for demos and machines without sensors.
//!
//! Cycles through activity archetypes, staying in each for a randomized
//! duration, and emits samples shaped like a phone carried in a pocket at a
//! fixed rate (50 Hz by default).

use crate::collector::types::{Activity, Sample};
use crate::collector::{CollectorError, RawSample, SampleSource};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default emission rate.
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 50.0;

type ShapeFn = fn(f64, &mut fastrand::Rng) -> [f64; 6];

/// One simulated activity: label, how long it lasts, and its signal shape.
struct Archetype {
    activity: Activity,
    /// Duration range in milliseconds
    duration_ms: (u64, u64),
    shape: ShapeFn,
}

/// Uniform noise in `[-amplitude / 2, amplitude / 2)`.
fn jitter(rng: &mut fastrand::Rng, amplitude: f64) -> f64 {
    (rng.f64() - 0.5) * amplitude
}

fn walking(t: f64, rng: &mut fastrand::Rng) -> [f64; 6] {
    [
        0.2 + (t * 4.0).sin() * 2.5 + jitter(rng, 0.3),
        9.5 + (t * 8.0).sin() * 1.2 + jitter(rng, 0.2),
        -0.8 + (t * 4.0).cos() * 1.8 + jitter(rng, 0.3),
        (t * 6.0).sin() * 50.0 + jitter(rng, 10.0),
        (t * 4.0).cos() * 40.0 + jitter(rng, 8.0),
        (t * 3.0).sin() * 30.0 + jitter(rng, 6.0),
    ]
}

fn walking_upstairs(t: f64, rng: &mut fastrand::Rng) -> [f64; 6] {
    [
        0.5 + (t * 3.5).sin() * 3.0 + jitter(rng, 0.4),
        10.2 + (t * 7.0).sin() * 2.0 + jitter(rng, 0.3),
        -1.5 + (t * 3.5).cos() * 2.5 + jitter(rng, 0.4),
        (t * 5.0).sin() * 70.0 + jitter(rng, 15.0),
        (t * 3.5).cos() * 55.0 + jitter(rng, 10.0),
        (t * 2.5).sin() * 40.0 + jitter(rng, 8.0),
    ]
}

fn sitting(_t: f64, rng: &mut fastrand::Rng) -> [f64; 6] {
    [
        0.05 + jitter(rng, 0.15),
        9.81 + jitter(rng, 0.1),
        -0.1 + jitter(rng, 0.12),
        jitter(rng, 3.0),
        jitter(rng, 2.0),
        jitter(rng, 2.0),
    ]
}

fn standing(_t: f64, rng: &mut fastrand::Rng) -> [f64; 6] {
    [
        0.02 + jitter(rng, 0.2),
        9.8 + jitter(rng, 0.15),
        -0.05 + jitter(rng, 0.18),
        jitter(rng, 5.0),
        jitter(rng, 4.0),
        jitter(rng, 3.0),
    ]
}

fn laying(_t: f64, rng: &mut fastrand::Rng) -> [f64; 6] {
    [
        0.01 + jitter(rng, 0.08),
        0.3 + jitter(rng, 0.1),
        9.78 + jitter(rng, 0.06),
        jitter(rng, 1.5),
        jitter(rng, 1.0),
        jitter(rng, 1.0),
    ]
}

const ARCHETYPES: [Archetype; 5] = [
    Archetype {
        activity: Activity::Walking,
        duration_ms: (8_000, 15_000),
        shape: walking,
    },
    Archetype {
        activity: Activity::WalkingUpstairs,
        duration_ms: (6_000, 12_000),
        shape: walking_upstairs,
    },
    Archetype {
        activity: Activity::Sitting,
        duration_ms: (10_000, 20_000),
        shape: sitting,
    },
    Archetype {
        activity: Activity::Standing,
        duration_ms: (8_000, 16_000),
        shape: standing,
    },
    Archetype {
        activity: Activity::Laying,
        duration_ms: (12_000, 25_000),
        shape: laying,
    },
];

/// Deterministic-given-seed sample generator driven by elapsed time.
pub struct SimulatedGenerator {
    rng: fastrand::Rng,
    index: usize,
    /// Elapsed time at which the current activity started
    activity_start: Duration,
    activity_duration: Duration,
}

impl SimulatedGenerator {
    /// Start at a random activity.
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Reproducible generator for tests and replay.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(mut rng: fastrand::Rng) -> Self {
        let index = rng.usize(..ARCHETYPES.len());
        let activity_duration = Self::draw_duration(&mut rng, index);
        Self {
            rng,
            index,
            activity_start: Duration::ZERO,
            activity_duration,
        }
    }

    fn draw_duration(rng: &mut fastrand::Rng, index: usize) -> Duration {
        let (min, max) = ARCHETYPES[index].duration_ms;
        Duration::from_millis(rng.u64(min..=max))
    }

    /// Activity currently being simulated.
    pub fn activity(&self) -> Activity {
        ARCHETYPES[self.index].activity
    }

    /// Produce the sample for `elapsed` time since the generator started.
    /// `elapsed` must not go backwards.
    pub fn sample_at(&mut self, elapsed: Duration) -> Sample {
        if elapsed.saturating_sub(self.activity_start) > self.activity_duration {
            self.index = (self.index + 1) % ARCHETYPES.len();
            self.activity_start = elapsed;
            self.activity_duration = Self::draw_duration(&mut self.rng, self.index);
            tracing::debug!("Simulated activity switched to {}", self.activity());
        }

        let t = elapsed.saturating_sub(self.activity_start).as_secs_f64();
        Sample((ARCHETYPES[self.index].shape)(t, &mut self.rng))
    }
}

impl Default for SimulatedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Source that emits simulated samples from a background thread.
pub struct SimulatedSource {
    sample_rate_hz: f64,
    seed: Option<u64>,
    sender: Sender<RawSample>,
    receiver: Receiver<RawSample>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SimulatedSource {
    /// Create a source emitting at `sample_rate_hz`.
    pub fn new(sample_rate_hz: f64) -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(10_000);
        Self {
            sample_rate_hz,
            seed: None,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Use a fixed seed so runs are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn period(&self) -> Result<Duration, CollectorError> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(CollectorError::InvalidRate(self.sample_rate_hz));
        }
        Ok(Duration::from_secs_f64(1.0 / self.sample_rate_hz))
    }
}

impl SampleSource for SimulatedSource {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        let period = self.period()?;

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let mut generator = match self.seed {
            Some(seed) => SimulatedGenerator::with_seed(seed),
            None => SimulatedGenerator::new(),
        };

        let handle = thread::spawn(move || {
            let started = Instant::now();
            let mut next_tick = started;

            while running.load(Ordering::SeqCst) {
                let sample = generator.sample_at(started.elapsed());
                match sender.try_send(sample.0.to_vec()) {
                    Ok(()) => {}
                    // consumer is behind; drop rather than block so stop() can join
                    Err(TrySendError::Full(_)) => {
                        tracing::trace!("Sample queue full, dropping simulated sample");
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }

                next_tick += period;
                let now = Instant::now();
                if next_tick > now {
                    thread::sleep(next_tick - now);
                } else {
                    // fell behind; do not try to catch up with a burst
                    next_tick = now;
                }
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<RawSample> {
        &self.receiver
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_reproducible() {
        let mut a = SimulatedGenerator::with_seed(7);
        let mut b = SimulatedGenerator::with_seed(7);
        for i in 0..100 {
            let t = Duration::from_millis(i * 20);
            assert_eq!(a.sample_at(t), b.sample_at(t));
        }
    }

    #[test]
    fn test_generator_cycles_activities() {
        let mut generator = SimulatedGenerator::with_seed(1);
        let first = generator.activity();

        // longest archetype lasts 25s; one minute of samples must switch
        let mut seen = vec![first];
        for i in 0..3_000u64 {
            generator.sample_at(Duration::from_millis(i * 20));
            if seen.last() != Some(&generator.activity()) {
                seen.push(generator.activity());
            }
        }
        assert!(seen.len() > 1);
        assert!(seen.iter().all(|a| *a != Activity::Unknown));
    }

    #[test]
    fn test_laying_has_gravity_on_z() {
        let mut rng = fastrand::Rng::with_seed(3);
        let sample = laying(0.0, &mut rng);
        assert!((sample[2] - 9.78).abs() < 0.05);
        assert!(sample[1].abs() < 0.5);
    }

    #[test]
    fn test_source_emits_and_stops() {
        let mut source = SimulatedSource::new(500.0).with_seed(11);
        source.start().unwrap();
        assert!(matches!(source.start(), Err(CollectorError::AlreadyRunning)));

        let sample = source
            .receiver()
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert_eq!(sample.len(), 6);

        source.stop();
        assert!(!source.is_running());

        // drain what was queued before stop; nothing arrives afterwards
        while source.receiver().try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(20));
        assert!(source.receiver().try_recv().is_err());
    }

    #[test]
    fn test_stop_returns_with_full_queue() {
        let mut source = SimulatedSource::new(1_000_000.0).with_seed(5);
        source.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while source.receiver().len() < 10_000 {
            assert!(Instant::now() < deadline, "queue never filled");
            thread::sleep(Duration::from_millis(5));
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            source.stop();
            let _ = done_tx.send(source.is_running());
        });

        let still_running = done_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("stop did not return with a full queue");
        assert!(!still_running);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let mut source = SimulatedSource::new(0.0);
        assert!(matches!(source.start(), Err(CollectorError::InvalidRate(_))));
        assert!(!source.is_running());
    }
}
