//! Merge plan emission and multiplexer result handling.
//!
//! This module turns the final keep-set into external tool invocations
//! and decides whether a finished mkvmerge run succeeded.
//!
//! # Architecture
//!
//! - **fragments**: Lays out surviving tracks in the intermediate file
//! - **commands**: Extraction, conversion, intermediate and verification invocations
//! - **flags**: Default/forced/original flags, exclusions and `--track-order`
//! - **plan**: Builds the ordered `MergePlan`
//! - **outcome**: Exit code 1 allowlist for UID reallocation warnings

mod commands;
mod flags;
mod fragments;
mod outcome;
mod plan;

pub use commands::{
    audio_codec_args, convert_invocation, extract_invocation, format_tokens_pretty,
    intermediate_invocation, subtitle_codec_args, verify_invocation, ConvertOptions,
};
pub use flags::{
    final_flags, final_invocation, DefaultAudioSlot, FinalFlags, FinalInputs, LanguageFlags,
};
pub use fragments::{intermediate_path, plan_fragments, Fragment, INTERMEDIATE_NAME};
pub use outcome::{check_mkvmerge, MuxOutcome};
pub use plan::{emit_plan, EmitConfig};
