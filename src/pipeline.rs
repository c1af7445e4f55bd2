//! Streaming session: source → window buffer → dispatcher → aggregator.
//!
//! The session loop owns the window buffer and pushes samples strictly in
//! arrival order. Each emitted window becomes a dispatch attempt on the
//! tokio runtime; results are applied to the shared aggregator only while
//! the session that produced the window is still active.

use crate::classifier::{ClassifierClient, ClassifierError, PredictionResult};
use crate::collector::{CollectorError, SampleSource};
use crate::core::dispatch::ThrottledDispatcher;
use crate::core::session::SharedAggregator;
use crate::core::windowing::{Window, WindowBuffer};
use crate::stats::SharedPipelineStats;
use crossbeam_channel::RecvTimeoutError;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Future returned by a prediction function.
pub type PredictFuture =
    Pin<Box<dyn Future<Output = Result<PredictionResult, ClassifierError>> + Send>>;

/// Remote prediction call as seen by the dispatcher.
pub type PredictFn = Box<dyn Fn(Window) -> PredictFuture + Send + Sync>;

/// Dispatcher type used by streaming sessions.
pub type SessionDispatcher = ThrottledDispatcher<PredictFn>;

type WindowCallback = Box<dyn FnMut(Window) + Send>;

/// Interval of the duration ticker.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Adapt a classifier client into a prediction function.
pub fn classifier_predictor(client: ClassifierClient) -> PredictFn {
    Box::new(move |window: Window| -> PredictFuture {
        let client = client.clone();
        Box::pin(async move { client.predict(&window).await })
    })
}

/// Everything a dispatch task needs, cloned into each window callback.
#[derive(Clone)]
struct DispatchContext {
    dispatcher: Arc<SessionDispatcher>,
    aggregator: SharedAggregator,
    stats: SharedPipelineStats,
    runtime: tokio::runtime::Handle,
}

impl DispatchContext {
    fn window_callback(&self, active: Arc<AtomicBool>) -> WindowCallback {
        let ctx = self.clone();
        Box::new(move |window: Window| {
            ctx.stats.record_window();
            if !active.load(Ordering::SeqCst) {
                return;
            }
            tracing::debug!("Window ready ({} samples)", window.len());
            ctx.runtime
                .spawn(ctx.clone().dispatch(window, active.clone()));
        })
    }

    async fn dispatch(self, window: Window, active: Arc<AtomicBool>) {
        match self.dispatcher.attempt(window).await {
            Ok(Some(result)) => {
                if !active.load(Ordering::SeqCst) {
                    self.stats.record_stale();
                    tracing::debug!("Discarding result for ended session");
                    return;
                }
                tracing::info!(
                    "Activity: {} ({:.1}%) in {:.1} ms",
                    result.activity,
                    result.confidence * 100.0,
                    result.inference_ms
                );
                self.stats.record_prediction();
                self.aggregator
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .record_prediction(result);
            }
            Ok(None) => self.stats.record_skipped(),
            Err(e) => {
                self.stats.record_failure();
                tracing::warn!("Prediction failed: {}", e);
            }
        }
    }
}

/// One streaming activation, from start until teardown.
pub struct StreamingSession {
    ctx: DispatchContext,
    buffer: WindowBuffer<WindowCallback>,
    /// Cleared on teardown or restart; in-flight results check it
    active: Arc<AtomicBool>,
}

impl StreamingSession {
    /// Create a session dispatching on `runtime`.
    pub fn new(
        dispatcher: Arc<SessionDispatcher>,
        aggregator: SharedAggregator,
        stats: SharedPipelineStats,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let ctx = DispatchContext {
            dispatcher,
            aggregator,
            stats,
            runtime,
        };
        let active = Arc::new(AtomicBool::new(true));
        let buffer = WindowBuffer::new(ctx.window_callback(active.clone()));
        Self {
            ctx,
            buffer,
            active,
        }
    }

    /// Push one raw sample. Malformed samples are counted and dropped.
    pub fn push(&mut self, sample: impl AsRef<[f64]>) -> bool {
        let accepted = self.buffer.push(sample);
        self.ctx.stats.record_sample(accepted);
        accepted
    }

    /// Credit the current activity with one second.
    pub fn tick(&self) {
        self.ctx
            .aggregator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .tick();
    }

    pub fn fill_percent(&self) -> u8 {
        self.buffer.fill_percent()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn aggregator(&self) -> &SharedAggregator {
        &self.ctx.aggregator
    }

    pub fn stats(&self) -> &SharedPipelineStats {
        &self.ctx.stats
    }

    /// Start over with a fresh buffer, e.g. when switching sources. Results
    /// still in flight for the old buffer are discarded.
    pub fn restart(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.active = Arc::new(AtomicBool::new(true));
        self.buffer = WindowBuffer::new(self.ctx.window_callback(self.active.clone()));
    }

    /// End the session. The source must already be stopped; calls still in
    /// flight may finish but their results are ignored.
    pub fn teardown(self) {
        self.active.store(false, Ordering::SeqCst);
        tracing::info!("Session ended");
    }
}

/// Drive `session` from `source` until `running` is cleared, `max_duration`
/// passes, or the source disconnects. The source is stopped before
/// returning.
pub fn run_session<S>(
    session: &mut StreamingSession,
    source: &mut S,
    running: &AtomicBool,
    max_duration: Option<Duration>,
) -> Result<(), CollectorError>
where
    S: SampleSource + ?Sized,
{
    source.start()?;
    tracing::info!("Streaming from {} source", source.name());

    let receiver = source.receiver().clone();
    let started = Instant::now();
    let mut last_tick = Instant::now();

    while running.load(Ordering::SeqCst) {
        if max_duration.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(sample) => {
                session.push(sample);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("Source {} finished", source.name());
                break;
            }
        }

        if last_tick.elapsed() >= TICK_INTERVAL {
            session.tick();
            last_tick = Instant::now();
        }
    }

    source.stop();
    Ok(())
}
