//! Pipeline runner that executes steps in sequence.

use std::fs;

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{Context, MergeSession, StepOutcome};

/// Pipeline that runs a sequence of steps.
///
/// Steps run to completion in order, with validation before and after
/// each one. A run is never interrupted between steps.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add a step to the pipeline.
    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Run the pipeline with the given context and session.
    ///
    /// Executes each step in order:
    /// 1. Run `validate_input`
    /// 2. Run `execute`
    /// 3. Run `validate_output` (if execute returned Success)
    ///
    /// A failing optional step is logged and recorded as skipped.
    ///
    /// Returns the step record on success, or a `PipelineError` on failure.
    pub fn run(&self, ctx: &Context, session: &mut MergeSession) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult {
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        };

        let total_steps = self.steps.len();

        for (i, step) in self.steps.iter().enumerate() {
            let step_name = step.name();
            ctx.logger.phase(step_name);

            // Report progress
            let percent = ((i as f64 / total_steps as f64) * 100.0) as u32;
            ctx.report_progress(step_name, percent, &format!("Starting {}", step_name));

            // Validate input
            ctx.logger.debug(&format!("Validating input for '{}'", step_name));
            if let Err(e) = step.validate_input(ctx) {
                ctx.logger.error(&format!("Input validation failed: {}", e));
                return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
            }

            // Execute
            ctx.logger.debug(&format!("Executing '{}'", step_name));
            let outcome = match step.execute(ctx, session) {
                Ok(outcome) => outcome,
                Err(e) if step.is_optional() => {
                    ctx.logger.warn(&format!("{} failed, continuing: {}", step_name, e));
                    StepOutcome::Skipped(e.to_string())
                }
                Err(e) => {
                    ctx.logger.error(&format!("Execution failed: {}", e));
                    ctx.logger.show_tail("tool output");
                    return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
                }
            };

            match outcome {
                StepOutcome::Success => {
                    // Validate output
                    ctx.logger
                        .debug(&format!("Validating output for '{}'", step_name));
                    if let Err(e) = step.validate_output(ctx, session) {
                        ctx.logger.error(&format!("Output validation failed: {}", e));
                        return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
                    }

                    ctx.logger.success(&format!("{} completed", step_name));
                    result.steps_completed.push(step_name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger
                        .info(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name.to_string());
                }
            }
        }

        // Final progress
        ctx.report_progress("Complete", 100, "Pipeline finished");
        ctx.logger.success("Pipeline completed successfully");

        Ok(result)
    }

    /// Run inside a fresh work directory that is removed afterwards,
    /// whether the run succeeded or not.
    pub fn run_in_work_dir(
        &self,
        ctx: &Context,
        session: &mut MergeSession,
    ) -> PipelineResult<PipelineRunResult> {
        fs::create_dir_all(&ctx.work_dir).map_err(|source| PipelineError::WorkDir {
            job_name: ctx.job_name.clone(),
            path: ctx.work_dir.clone(),
            source,
        })?;

        let result = self.run(ctx, session);

        match fs::remove_dir_all(&ctx.work_dir) {
            Ok(()) => ctx
                .logger
                .debug(&format!("Removed work directory {}", ctx.work_dir.display())),
            Err(e) => ctx.logger.warn(&format!(
                "Could not remove work directory {}: {}",
                ctx.work_dir.display(),
                e
            )),
        }
        ctx.logger.flush();
        result
    }

    /// Get the number of steps in the pipeline.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRunResult {
    /// Steps that completed successfully.
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    pub steps_skipped: Vec<String>,
}

impl PipelineRunResult {
    /// Check if all steps completed (none skipped).
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty()
    }

    /// Total number of steps that ran.
    pub fn total_steps(&self) -> usize {
        self.steps_completed.len() + self.steps_skipped.len()
    }
}
