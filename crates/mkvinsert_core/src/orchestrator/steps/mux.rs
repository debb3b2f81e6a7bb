//! Mux steps - intermediate multiplex, verification and final multiplex.

use std::fs;

use crate::models::{Invocation, PlanStage, Tool, TrackStage};
use crate::mux::{check_mkvmerge, emit_plan, MuxOutcome};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, MergeSession, StepOutcome};

/// Planned invocation of a single-command stage.
fn planned(session: &MergeSession, stage: PlanStage) -> StepResult<Invocation> {
    session
        .plan
        .as_ref()
        .and_then(|plan| plan.stage(stage).next().cloned())
        .ok_or_else(|| StepError::precondition_failed(format!("No {:?} command planned", stage)))
}

/// Run mkvmerge on the session's mux pool and apply the UID allowlist.
fn run_mkvmerge(ctx: &Context, session: &MergeSession, invocation: &Invocation) -> StepResult<MuxOutcome> {
    ctx.logger.command(invocation);
    let runner = ctx.runner.as_ref();
    let output = session.pools.mux.install(|| runner.run(invocation))?;
    ctx.logger.tool_output(&output);

    let outcome = check_mkvmerge(&output)?;
    if let MuxOutcome::UidWarnings(n) = outcome {
        ctx.logger
            .warn(&format!("mkvmerge reallocated {} track UID(s)", n));
    }
    Ok(outcome)
}

/// Assembles the converted fragments into the intermediate file.
pub struct IntermediateMuxStep;

impl IntermediateMuxStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IntermediateMuxStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for IntermediateMuxStep {
    fn name(&self) -> &str {
        "Intermediate mux"
    }

    fn description(&self) -> &str {
        "Assemble converted tracks into one file"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        if session.fragments.is_empty() {
            return Ok(StepOutcome::Skipped("no audio or subtitle track kept".to_string()));
        }
        let invocation = planned(session, PlanStage::IntermediateMux)?;
        let outcome = run_mkvmerge(ctx, session, &invocation)?;
        session.note_mux(outcome);
        for fragment in &mut session.fragments {
            fragment.advance();
        }
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, session: &MergeSession) -> StepResult<()> {
        if session.fragments.iter().any(|f| f.stage != TrackStage::Muxed) {
            return Err(StepError::invalid_output("Fragment left out of the intermediate file"));
        }
        Ok(())
    }
}

/// Decodes the intermediate file end to end; any bitstream error fails the run.
pub struct VerifyStep;

impl VerifyStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VerifyStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for VerifyStep {
    fn name(&self) -> &str {
        "Verify"
    }

    fn description(&self) -> &str {
        "Decode the intermediate file to confirm it is valid"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        if session.fragments.is_empty() {
            return Ok(StepOutcome::Skipped("no intermediate file".to_string()));
        }
        let invocation = planned(session, PlanStage::Verify)?;
        ctx.logger.command(&invocation);
        let output = ctx.runner.run(&invocation)?;
        ctx.logger.tool_output(&output);
        output.checked(Tool::Ffmpeg)?;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _session: &MergeSession) -> StepResult<()> {
        Ok(())
    }
}

/// Writes the output: enriched video, kept tracks, source chapters.
pub struct FinalMuxStep;

impl FinalMuxStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FinalMuxStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for FinalMuxStep {
    fn name(&self) -> &str {
        "Final mux"
    }

    fn description(&self) -> &str {
        "Merge the enriched video with the kept tracks"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if let Some(parent) = ctx.inputs.output.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StepError::io_error("creating output directory", e))?;
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        let late_drops = session
            .fragments
            .iter()
            .filter(|f| !session.records[f.record].keep())
            .count();
        if late_drops > 0 {
            ctx.logger.info(&format!(
                "Excluding {} track(s) dropped after the intermediate mux",
                late_drops
            ));
            let config = ctx.emit_config(session);
            let plan = emit_plan(
                &session.records,
                &session.fragments,
                &config,
                &mut session.default_audio,
            );
            session.plan = Some(plan);
        }

        let invocation = planned(session, PlanStage::FinalMux)?;
        if ctx.settings.logging.show_options_pretty {
            ctx.logger.mkvmerge_options_pretty(&invocation.args);
        }
        if ctx.settings.logging.show_options_json {
            ctx.logger.mkvmerge_options_json(&invocation.args);
        }

        let outcome = run_mkvmerge(ctx, session, &invocation)?;
        session.note_mux(outcome);
        ctx.logger
            .success(&format!("Wrote {}", ctx.inputs.output.display()));
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, session: &MergeSession) -> StepResult<()> {
        if session.default_audio.assigned().is_none()
            && session
                .fragments
                .iter()
                .any(|f| f.kind.is_audio() && session.records[f.record].keep())
        {
            return Err(StepError::invalid_output("No default audio track assigned"));
        }
        Ok(())
    }
}
