//! Plan step - lays out fragments and emits the command list.

use crate::models::PlanStage;
use crate::mux::{emit_plan, plan_fragments};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, MergeSession, StepOutcome};

/// Emits the merge plan from the final keep-set.
///
/// In a dry run this is the last step and the plan is the result.
pub struct PlanStep;

impl PlanStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlanStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PlanStep {
    fn name(&self) -> &str {
        "Plan"
    }

    fn description(&self) -> &str {
        "Translate the kept tracks into extraction, conversion and mux commands"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        session.summary.kept = session.kept().count();
        for record in session.records.iter().filter(|r| !r.keep()) {
            ctx.logger.debug(&format!(
                "  dropped {}: {}",
                record.label(),
                record.drop_reason().unwrap_or("")
            ));
        }

        session.fragments = plan_fragments(&session.records, &ctx.work_dir);
        let config = ctx.emit_config(session);
        let plan = emit_plan(
            &session.records,
            &session.fragments,
            &config,
            &mut session.default_audio,
        );

        ctx.logger.info(&format!(
            "Keeping {} of {} streams, {} command(s) planned",
            session.summary.kept,
            session.records.len(),
            plan.commands().len()
        ));
        ctx.logger
            .info(&format!("Track order: {}", plan.track_order().join(",")));

        if let Some(final_mux) = plan.stage(PlanStage::FinalMux).next() {
            if ctx.settings.logging.show_options_pretty {
                ctx.logger.mkvmerge_options_pretty(&final_mux.args);
            }
            if ctx.settings.logging.show_options_json {
                ctx.logger.mkvmerge_options_json(&final_mux.args);
            }
        }

        session.plan = Some(plan);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, session: &MergeSession) -> StepResult<()> {
        let Some(plan) = session.plan.as_ref() else {
            return Err(StepError::invalid_output("Merge plan not recorded"));
        };
        if plan.stage(PlanStage::FinalMux).count() != 1 {
            return Err(StepError::invalid_output(
                "Merge plan must end with exactly one final mux",
            ));
        }
        Ok(())
    }
}
