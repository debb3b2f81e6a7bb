//! Subtitle step - keep-list filter, forced collapse and stream budget.

use crate::orchestrator::errors::StepResult;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, MergeSession, StepOutcome};
use crate::subtitles::reduce_subtitles;

/// Reduces subtitles until the kept stream count fits `max_streams`.
pub struct SubtitlePruneStep;

impl SubtitlePruneStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SubtitlePruneStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for SubtitlePruneStep {
    fn name(&self) -> &str {
        "Subtitles"
    }

    fn description(&self) -> &str {
        "Collapse subtitle variants and enforce the stream budget"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        let merge = &ctx.settings.merge;
        let policy = ctx.language_policy();
        let summary = reduce_subtitles(
            &mut session.records,
            &policy,
            merge.remove_subtitles_outside_keep,
            merge.max_streams,
        );

        if summary.outside_keep > 0 {
            ctx.logger.decision(&format!(
                "Dropped {} subtitle(s) outside the keep list",
                summary.outside_keep
            ));
        }
        if summary.forced_collapsed > 0 {
            ctx.logger.decision(&format!(
                "Collapsed {} duplicate forced subtitle(s)",
                summary.forced_collapsed
            ));
        }

        let budget = &summary.budget;
        ctx.logger.info(&format!(
            "Stream budget: {} -> {} of {} ({} step(s))",
            budget.before,
            budget.after,
            budget.max_streams,
            budget.steps_run.len()
        ));
        for step in &budget.steps_run {
            ctx.logger.debug(&format!("  ran {}", step));
        }
        if !budget.within_budget() {
            ctx.logger.warn(&format!(
                "{} streams remain after pruning, over the budget of {}",
                budget.after, budget.max_streams
            ));
        }

        session.summary.subtitles_outside_keep = summary.outside_keep;
        session.summary.forced_collapsed = summary.forced_collapsed;
        session.summary.budget_dropped = budget.before - budget.after;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _session: &MergeSession) -> StepResult<()> {
        Ok(())
    }
}
