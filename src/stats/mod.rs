//! Pipeline statistics for the HAR stream agent.
//!
//! Counts accepted and rejected samples, emitted windows and dispatch
//! outcomes so a running session can be inspected and audited.

pub mod counters;

// Re-export commonly used types
pub use counters::{
    create_shared_stats, create_shared_stats_with_persistence, PipelineStats,
    SharedPipelineStats, StatsSnapshot,
};
