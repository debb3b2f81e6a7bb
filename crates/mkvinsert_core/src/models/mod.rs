//! Data models for the merge pass.
//!
//! This module contains the core data structures shared by every stage:
//! - Enums for input slots, track kinds, subtitle categories, track stages
//! - Stream records with their one-way keep flag
//! - Language groups over the record arena
//! - Invocations and the emitted merge plan

mod enums;
mod groups;
mod media;
mod plan;

pub use enums::{
    AudioRole, CompressionMode, SourceSlot, SubtitleCategory, SubtitleCodecClass, TrackKind,
    TrackStage,
};
pub use groups::{group_records, TrackGroup};
pub use media::{AudioProps, StreamDetail, StreamRecord, SubtitleProps};
pub use plan::{Invocation, MergePlan, PlanStage, PlannedCommand, Tool};

#[cfg(test)]
pub(crate) use media::fixtures;
