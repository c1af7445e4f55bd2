//! Core functionality for the HAR stream agent.
//!
//! This module contains:
//! - The window buffer that turns samples into overlapping windows
//! - The throttled dispatcher gating classifier calls
//! - Session aggregation, calorie estimation and summary export

pub mod calories;
pub mod dispatch;
pub mod session;
pub mod summary;
pub mod windowing;

// Re-export commonly used types
pub use calories::{estimate_calories, format_duration, total_calories, DEFAULT_WEIGHT_KG};
pub use dispatch::{ThrottledDispatcher, DEFAULT_MIN_INTERVAL};
pub use session::{SessionAggregator, SessionSnapshot, SharedAggregator, TimelineEntry};
pub use summary::{SeriesStats, SessionSummary, SummaryBuilder, PRODUCER_NAME};
pub use windowing::{Window, WindowBuffer, MAX_BUFFER_LEN, OVERLAP_SHIFT, WINDOW_SIZE};
