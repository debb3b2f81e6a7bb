//! Audio dedup step - fidelity comparison and rule-based selection.

use crate::fidelity::{
    classify_pair, cluster, compare_group, DistinctReason, GroupComparison, PairClass, Thresholds,
};
use crate::models::StreamRecord;
use crate::models::TrackKind;
use crate::orchestrator::errors::StepResult;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, MergeSession, StepOutcome};
use crate::selection::select_losers;

/// For each audio group language with several kept tracks: correlate all
/// pairs, cluster duplicates, keep the best track of each cluster.
///
/// A group whose comparison fails keeps every track.
pub struct AudioDedupStep;

impl AudioDedupStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AudioDedupStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Pairwise duplicate table over the compared members. Pairs that
/// correlate well but sit too far apart are reported and kept apart.
fn classify_all(
    ctx: &Context,
    records: &[StreamRecord],
    comparison: &GroupComparison,
    thresholds: &Thresholds,
) -> Vec<Vec<bool>> {
    let n = comparison.members.len();
    let mut duplicates = vec![vec![false; n]; n];
    for a in 0..n {
        for b in a + 1..n {
            match classify_pair(&comparison.matrix, a, b, thresholds) {
                PairClass::Duplicate => {
                    duplicates[a][b] = true;
                    duplicates[b][a] = true;
                }
                PairClass::Distinct(DistinctReason::Misaligned { mean, delays }) => {
                    ctx.logger.warn(&format!(
                        "{} and {} correlate at {:.3} but are offset by {:?} samples, keeping both",
                        records[comparison.members[a]].label(),
                        records[comparison.members[b]].label(),
                        mean,
                        delays
                    ));
                }
                PairClass::Distinct(_) => {}
            }
        }
    }
    duplicates
}

impl PipelineStep for AudioDedupStep {
    fn name(&self) -> &str {
        "Audio dedup"
    }

    fn description(&self) -> &str {
        "Correlate same-language audio tracks and keep the best of each duplicate set"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, session: &mut MergeSession) -> StepResult<StepOutcome> {
        let settings = &ctx.settings.fidelity;
        if !settings.enabled {
            return Ok(StepOutcome::Skipped("fidelity comparison disabled".to_string()));
        }
        let thresholds = Thresholds::from(settings);
        let mut dropped = 0;

        for kind in [TrackKind::Audio, TrackKind::Commentary, TrackKind::AudioDescription] {
            let Some(group) = session.groups.get(&kind) else {
                continue;
            };
            for language in group.languages.keys() {
                let candidates = group.kept(language, &session.records);
                if candidates.len() < 2 {
                    continue;
                }
                ctx.logger.section(&format!(
                    "{} {}: comparing {} tracks",
                    kind,
                    language,
                    candidates.len()
                ));

                let segment_dir = ctx
                    .work_dir
                    .join(format!("fidelity_{}_{}", kind, language).replace(' ', "_"));
                let comparison = match compare_group(
                    ctx.runner.as_ref(),
                    ctx.correlator.as_ref(),
                    &session.records,
                    &candidates,
                    |slot| ctx.inputs.path(slot),
                    settings,
                    &segment_dir,
                ) {
                    Ok(Some(comparison)) => comparison,
                    Ok(None) => {
                        ctx.logger.info("Not enough comparable tracks, keeping all");
                        continue;
                    }
                    Err(e) => {
                        ctx.logger.warn(&format!("Comparison failed, keeping all: {}", e));
                        continue;
                    }
                };

                let duplicates = classify_all(ctx, &session.records, &comparison, &thresholds);
                let clusters = cluster(comparison.members.len(), |a, b| duplicates[a][b]);
                for positions in clusters.iter().filter(|c| c.len() > 1) {
                    let members: Vec<usize> =
                        positions.iter().map(|&p| comparison.members[p]).collect();
                    let losers = select_losers(&session.records, &members, &ctx.rules);
                    for (index, reason) in losers {
                        let label = session.records[index].label();
                        if session.records[index].discard(format!("fidelity duplicate, {}", reason)) {
                            ctx.logger.decision(&format!("Drop {}: {}", label, reason));
                            dropped += 1;
                        }
                    }
                }
            }
        }

        session.summary.fidelity_duplicates = dropped;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _session: &MergeSession) -> StepResult<()> {
        Ok(())
    }

    fn is_optional(&self) -> bool {
        true
    }
}
