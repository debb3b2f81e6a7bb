//! Pipeline step implementations.
//!
//! Each step handles one phase of the merge: analysis steps mutate the
//! stream records, run steps execute the planned commands.

mod converted;
mod convert;
mod dedup;
mod fingerprint;
mod mux;
mod plan;
mod probe;
mod subtitles;

pub use convert::ConvertStep;
pub use converted::ConvertedDuplicatesStep;
pub use dedup::AudioDedupStep;
pub use fingerprint::FingerprintStep;
pub use mux::{FinalMuxStep, IntermediateMuxStep, VerifyStep};
pub use plan::PlanStep;
pub use probe::ProbeStep;
pub use subtitles::SubtitlePruneStep;
