//! Converted-duplicates step - drops styled subtitles that repeat a kept text track.

use crate::mux::intermediate_path;
use crate::orchestrator::errors::StepResult;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, MergeSession, StepOutcome};
use crate::subtitles::{apply_removals, find_converted_duplicates, DigestTarget};

/// Compares subtitles as they sit in the intermediate file.
///
/// Dropped tracks stay in the intermediate file and are excluded from the
/// final mux.
pub struct ConvertedDuplicatesStep;

impl ConvertedDuplicatesStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConvertedDuplicatesStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ConvertedDuplicatesStep {
    fn name(&self) -> &str {
        "Converted duplicates"
    }

    fn description(&self) -> &str {
        "Drop styled subtitles whose text matches a kept text subtitle"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        if session.fragments.is_empty() {
            return Ok(StepOutcome::Skipped("no intermediate file".to_string()));
        }

        let intermediate = intermediate_path(&ctx.work_dir);
        let targets: Vec<DigestTarget<'_>> = session
            .fragments
            .iter()
            .filter(|f| !f.kind.is_audio())
            .map(|f| DigestTarget {
                record: f.record,
                path: &intermediate,
                stream_order: f.intermediate_id,
            })
            .collect();

        let removals = find_converted_duplicates(ctx.runner.as_ref(), &session.records, &targets);
        for (index, reason) in &removals {
            ctx.logger
                .decision(&format!("Drop {}: {}", session.records[*index].label(), reason));
        }
        let dropped = apply_removals(&mut session.records, removals);
        session.summary.converted_duplicates = dropped;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _session: &MergeSession) -> StepResult<()> {
        Ok(())
    }

    fn is_optional(&self) -> bool {
        true
    }
}
