//! Probe step - reads stream metadata from both input files.

use crate::models::{group_records, SourceSlot};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, MergeSession, StepOutcome};
use crate::probe::probe_file;

/// Probes the source and the enriched file with ffprobe.
///
/// Records of the source come first. The original language and the
/// duration fragments are cut to come from the source.
pub struct ProbeStep;

impl ProbeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProbeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ProbeStep {
    fn name(&self) -> &str {
        "Probe"
    }

    fn description(&self) -> &str {
        "Read audio and subtitle streams of both inputs"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        for slot in [SourceSlot::Source, SourceSlot::Enriched] {
            let path = ctx.inputs.path(slot);
            if !path.is_file() {
                return Err(StepError::invalid_input(format!(
                    "{} file not found: {}",
                    slot,
                    path.display()
                )));
            }
        }
        if ctx.inputs.output == ctx.inputs.source || ctx.inputs.output == ctx.inputs.enriched {
            return Err(StepError::invalid_input(
                "Output path must differ from both inputs",
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        let runner = ctx.runner.as_ref();
        let source = probe_file(runner, SourceSlot::Source, &ctx.inputs.source)?;
        let enriched = probe_file(runner, SourceSlot::Enriched, &ctx.inputs.enriched)?;

        session.original_language = source.original_language().map(str::to_string);
        session.duration_secs = source.duration_secs.or(enriched.duration_secs);

        match session.original_language {
            Some(ref lang) => ctx.logger.info(&format!("Original language: {}", lang)),
            None => ctx.logger.info("Original language: unknown"),
        }

        for probed in [&source, &enriched] {
            ctx.logger.info(&format!(
                "{}: {} audio/subtitle stream(s) in {}",
                probed.slot,
                probed.records.len(),
                probed.path.display()
            ));
        }

        session.records = source.records;
        session.records.extend(enriched.records);
        session.groups = group_records(&session.records);
        session.summary.probed = session.records.len();

        for record in &session.records {
            ctx.logger.debug(&format!("  {} \"{}\"", record.label(), record.title));
        }

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, session: &MergeSession) -> StepResult<()> {
        let grouped: usize = session
            .groups
            .values()
            .flat_map(|g| g.languages.values())
            .map(Vec::len)
            .sum();
        if grouped != session.records.len() {
            return Err(StepError::invalid_output(format!(
                "{} records but {} grouped",
                session.records.len(),
                grouped
            )));
        }
        Ok(())
    }
}
