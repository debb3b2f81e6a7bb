//! Convert step - extracts and normalizes every kept track.

use rayon::prelude::*;

use crate::models::{Invocation, PlanStage, Tool, TrackStage};
use crate::mux::{check_mkvmerge, MuxOutcome};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, MergeSession, StepOutcome};
use crate::runner::ToolRunner;

/// Runs the planned extraction and conversion of each fragment on the
/// conversion pool. Returns only after every fragment is on disk.
pub struct ConvertStep;

impl ConvertStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConvertStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract then convert one fragment. Returns accepted UID warnings.
fn run_fragment(
    runner: &dyn ToolRunner,
    extract: &Invocation,
    convert: &Invocation,
) -> StepResult<usize> {
    let outcome = check_mkvmerge(&runner.run(extract)?)?;
    runner.run(convert)?.checked(Tool::Ffmpeg)?;
    Ok(match outcome {
        MuxOutcome::UidWarnings(n) => n,
        MuxOutcome::Clean => 0,
    })
}

impl PipelineStep for ConvertStep {
    fn name(&self) -> &str {
        "Convert"
    }

    fn description(&self) -> &str {
        "Extract each kept track and normalize its codec"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        let plan = session
            .plan
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("No merge plan"))?;
        if session.fragments.is_empty() {
            return Ok(StepOutcome::Skipped("no audio or subtitle track kept".to_string()));
        }

        let jobs: Vec<(&Invocation, &Invocation)> = plan
            .stage(PlanStage::Extract)
            .zip(plan.stage(PlanStage::Convert))
            .collect();
        if jobs.len() != session.fragments.len() {
            return Err(StepError::precondition_failed(format!(
                "{} fragments but {} planned conversions",
                session.fragments.len(),
                jobs.len()
            )));
        }

        for (extract, convert) in &jobs {
            ctx.logger.command(extract);
            ctx.logger.command(convert);
        }

        let runner = ctx.runner.as_ref();
        let total = jobs.len();
        let results: Vec<StepResult<usize>> = session.pools.conversion.install(|| {
            jobs.par_iter()
                .map(|(extract, convert)| run_fragment(runner, extract, convert))
                .collect()
        });

        let mut done = 0;
        for (fragment, result) in session.fragments.iter_mut().zip(results) {
            let warnings = result?;
            session.summary.uid_warnings += warnings;
            fragment.advance();
            fragment.advance();
            done += 1;
            let percent = (done * 100 / total) as u32;
            if ctx.logger.progress(percent) {
                ctx.report_progress(self.name(), percent, "Converting tracks");
            }
        }

        ctx.logger
            .success(&format!("{} track(s) extracted and converted", total));
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, session: &MergeSession) -> StepResult<()> {
        if let Some(f) = session
            .fragments
            .iter()
            .find(|f| f.stage != TrackStage::Converted)
        {
            return Err(StepError::invalid_output(format!(
                "{}#{} is {:?}, expected Converted",
                f.slot, f.stream_order, f.stage
            )));
        }
        Ok(())
    }
}
