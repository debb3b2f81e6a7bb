//! Audio fidelity comparison.
//!
//! Tracks of one language group are cut at the same positions, decoded to
//! a common PCM layout and correlated pairwise. Pairs whose segments agree
//! in score and alignment are duplicates; duplicates form clusters in which
//! only the best track survives.
//!
//! # Flow
//!
//! ```text
//! comparable members -> ComparisonProfile + SegmentPlan
//!     -> ffmpeg segment extraction (pool)
//!     -> FidelityCorrelator per (pair, segment) (pool, collect = barrier)
//!     -> FidelityMatrix -> classify -> cluster
//! ```

mod classify;
mod compare;
mod segments;
mod types;
mod waveform;

pub use classify::{classify, classify_pair, cluster, mean_score, DistinctReason, PairClass};
pub use compare::{compare_group, comparable, GroupComparison, MAX_CORRELATION_THREADS};
pub use segments::{segment_invocation, Segment, SegmentPlan, MIN_SEGMENT_SECS};
pub use types::{
    ComparisonProfile, FidelityCorrelator, FidelityError, FidelityMatrix, FidelityResult,
    SegmentFidelity, Thresholds,
};
pub use waveform::WaveformCorrelator;

#[cfg(test)]
pub(crate) use compare::scripted::ScriptedCorrelator;
