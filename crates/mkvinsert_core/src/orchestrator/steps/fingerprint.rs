//! Fingerprint step - drops exact duplicates by packet hash.

use crate::fingerprint::{collapse_duplicates, compute_hashes};
use crate::orchestrator::errors::StepResult;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, MergeSession, StepOutcome};

/// Hashes every stream on the conversion pool, then keeps the first of
/// each group of identical streams.
pub struct FingerprintStep;

impl FingerprintStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FingerprintStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for FingerprintStep {
    fn name(&self) -> &str {
        "Fingerprint"
    }

    fn description(&self) -> &str {
        "Drop streams whose packets are byte-identical"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        if session.records.len() < 2 {
            return Ok(StepOutcome::Skipped("fewer than two streams".to_string()));
        }

        let hashes = compute_hashes(
            ctx.runner.as_ref(),
            &session.pools.conversion,
            &session.records,
            |slot| ctx.inputs.path(slot),
        );
        for (record, hash) in session.records.iter_mut().zip(hashes) {
            record.content_hash = hash;
        }

        let dropped = collapse_duplicates(&mut session.records);
        session.summary.fingerprint_duplicates = dropped;
        if dropped > 0 {
            ctx.logger.decision(&format!(
                "Dropped {} stream(s) with identical content",
                dropped
            ));
        }
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _session: &MergeSession) -> StepResult<()> {
        Ok(())
    }
}
