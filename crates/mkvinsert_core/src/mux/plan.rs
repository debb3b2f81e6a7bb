//! Turns the final keep-set into an ordered command list.

use std::path::{Path, PathBuf};

use super::commands::{
    convert_invocation, extract_invocation, intermediate_invocation, verify_invocation,
    ConvertOptions,
};
use super::flags::{final_flags, final_invocation, DefaultAudioSlot, FinalInputs, LanguageFlags};
use super::fragments::{intermediate_path, Fragment};
use crate::models::{MergePlan, PlanStage, PlannedCommand, SourceSlot, StreamRecord};

/// Paths and policy for one plan.
#[derive(Debug, Clone)]
pub struct EmitConfig {
    pub work_dir: PathBuf,
    pub source: PathBuf,
    pub enriched: PathBuf,
    pub output: PathBuf,
    pub convert: ConvertOptions,
    pub change_all_und: bool,
    pub undetermined_language: String,
    pub original_language: Option<String>,
}

impl EmitConfig {
    /// Input file of a slot.
    pub fn input(&self, slot: SourceSlot) -> &Path {
        match slot {
            SourceSlot::Source => &self.source,
            SourceSlot::Enriched => &self.enriched,
        }
    }

    pub fn language_flags(&self) -> LanguageFlags<'_> {
        LanguageFlags {
            original_language: self.original_language.as_deref(),
            change_all_und: self.change_all_und,
            undetermined_language: &self.undetermined_language,
        }
    }
}

/// Build the full command list for `fragments`.
///
/// The output depends only on its inputs: identical records, fragments and
/// config give byte-identical plans.
pub fn emit_plan(
    records: &[StreamRecord],
    fragments: &[Fragment],
    config: &EmitConfig,
    slot: &mut DefaultAudioSlot,
) -> MergePlan {
    let mut commands = Vec::with_capacity(fragments.len() * 2 + 3);

    for fragment in fragments {
        let record = &records[fragment.record];
        commands.push(PlannedCommand {
            stage: PlanStage::Extract,
            invocation: extract_invocation(
                config.input(fragment.slot),
                fragment.kind,
                fragment.stream_order,
                &fragment.extract_path,
            ),
        });
        commands.push(PlannedCommand {
            stage: PlanStage::Convert,
            invocation: convert_invocation(
                &record.detail,
                &fragment.extract_path,
                &fragment.convert_path,
                &config.convert,
            ),
        });
    }

    let intermediate = intermediate_path(&config.work_dir);
    let has_tracks = !fragments.is_empty();
    if has_tracks {
        commands.push(PlannedCommand {
            stage: PlanStage::IntermediateMux,
            invocation: intermediate_invocation(
                &intermediate,
                fragments.iter().map(|f| f.convert_path.as_path()),
            ),
        });
        commands.push(PlannedCommand {
            stage: PlanStage::Verify,
            invocation: verify_invocation(&intermediate, config.convert.threads),
        });
    }

    let flags = final_flags(records, fragments, &config.language_flags(), slot);
    let inputs = FinalInputs {
        output: &config.output,
        enriched: &config.enriched,
        source: &config.source,
        intermediate: has_tracks.then_some(intermediate.as_path()),
    };
    commands.push(PlannedCommand {
        stage: PlanStage::FinalMux,
        invocation: final_invocation(&inputs, &flags),
    });

    MergePlan::new(commands, flags.track_order)
}
