//! Segment extraction and correlation for one language group.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::segments::{segment_invocation, Segment, SegmentPlan};
use super::types::{
    ComparisonProfile, FidelityCorrelator, FidelityError, FidelityMatrix, FidelityResult,
    SegmentFidelity,
};
use crate::config::FidelitySettings;
use crate::models::{SourceSlot, StreamRecord, Tool};
use crate::runner::ToolRunner;

/// Upper bound on correlation threads for one group.
pub const MAX_CORRELATION_THREADS: usize = 64;

/// Fidelity data for the comparable members of one group.
#[derive(Debug, Clone)]
pub struct GroupComparison {
    /// Record indices; matrix positions refer to this list.
    pub members: Vec<usize>,
    pub matrix: FidelityMatrix,
    pub plan: SegmentPlan,
    pub profile: ComparisonProfile,
}

/// Record indices that carry what segment extraction needs.
///
/// Records missing a duration, channel count or sample rate stay out of
/// the comparison and are therefore kept.
pub fn comparable(records: &[StreamRecord], indices: &[usize]) -> Vec<usize> {
    indices
        .iter()
        .copied()
        .filter(|&i| {
            let record = &records[i];
            let usable = record.keep()
                && record.duration_secs.is_some_and(|d| d > 0.0)
                && record
                    .as_audio()
                    .is_some_and(|a| a.channels > 0 && a.sampling_rate > 0);
            if !usable && record.keep() {
                tracing::warn!(
                    "{}: missing duration or audio layout, excluded from comparison",
                    record.label()
                );
            }
            usable
        })
        .collect()
}

fn segment_path(dir: &Path, record: &StreamRecord, segment: &Segment) -> PathBuf {
    dir.join(format!(
        "{}_{}_{}.wav",
        record.slot, record.stream_order, segment.index
    ))
}

/// Extract segments of every comparable member and correlate all pairs.
///
/// Returns `Ok(None)` when fewer than two members are comparable or the
/// shortest member is too short for a segment plan. `segment_dir` is
/// removed before returning, on success and on failure.
pub fn compare_group<'a>(
    runner: &dyn ToolRunner,
    correlator: &dyn FidelityCorrelator,
    records: &[StreamRecord],
    indices: &[usize],
    input_of: impl Fn(SourceSlot) -> &'a Path + Sync,
    settings: &FidelitySettings,
    segment_dir: &Path,
) -> FidelityResult<Option<GroupComparison>> {
    let members = comparable(records, indices);
    if members.len() < 2 {
        return Ok(None);
    }

    let layouts: Vec<(u32, u32)> = members
        .iter()
        .filter_map(|&i| records[i].as_audio())
        .map(|a| (a.channels, a.sampling_rate))
        .collect();
    let Some(profile) = ComparisonProfile::for_candidates(&layouts) else {
        return Ok(None);
    };

    let shortest = members
        .iter()
        .filter_map(|&i| records[i].duration_secs)
        .fold(f64::INFINITY, f64::min);
    let Some(plan) = SegmentPlan::new(shortest, settings.cuts, settings.max_window_secs) else {
        tracing::info!(
            "Shortest candidate ({:.1}s) too short for {} cuts, skipping comparison",
            shortest,
            settings.cuts
        );
        return Ok(None);
    };

    let pairs: Vec<(usize, usize)> = (0..members.len())
        .flat_map(|i| (i + 1..members.len()).map(move |j| (i, j)))
        .collect();

    fs::create_dir_all(segment_dir)?;
    let result = run_jobs(
        runner,
        correlator,
        records,
        &members,
        &pairs,
        &plan,
        &profile,
        &input_of,
        segment_dir,
    );
    if let Err(e) = fs::remove_dir_all(segment_dir) {
        tracing::debug!("Could not remove {}: {}", segment_dir.display(), e);
    }

    let mut matrix = FidelityMatrix::new();
    for (i, j, fidelity) in result? {
        matrix.push(i, j, fidelity);
    }

    Ok(Some(GroupComparison {
        members,
        matrix,
        plan,
        profile,
    }))
}

#[allow(clippy::too_many_arguments)]
fn run_jobs<'a>(
    runner: &dyn ToolRunner,
    correlator: &dyn FidelityCorrelator,
    records: &[StreamRecord],
    members: &[usize],
    pairs: &[(usize, usize)],
    plan: &SegmentPlan,
    profile: &ComparisonProfile,
    input_of: &(impl Fn(SourceSlot) -> &'a Path + Sync),
    segment_dir: &Path,
) -> FidelityResult<Vec<(usize, usize, SegmentFidelity)>> {
    let threads = (plan.len() * pairs.len()).clamp(1, MAX_CORRELATION_THREADS);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("fidelity-{}", i))
        .build()
        .map_err(|e| FidelityError::Pool(e.to_string()))?;

    pool.install(|| {
        let extractions: Vec<(usize, &Segment)> = members
            .iter()
            .copied()
            .flat_map(|m| plan.segments.iter().map(move |s| (m, s)))
            .collect();

        extractions
            .par_iter()
            .map(|&(m, segment)| -> FidelityResult<()> {
                let record = &records[m];
                let output = segment_path(segment_dir, record, segment);
                let invocation = segment_invocation(
                    input_of(record.slot),
                    record.stream_order,
                    segment,
                    profile,
                    &output,
                );
                runner.run(&invocation)?.checked(Tool::Ffmpeg)?;
                Ok(())
            })
            .collect::<FidelityResult<Vec<()>>>()?;

        let jobs: Vec<(usize, usize, &Segment)> = pairs
            .iter()
            .flat_map(|&(i, j)| plan.segments.iter().map(move |s| (i, j, s)))
            .collect();

        jobs.par_iter()
            .map(|&(i, j, segment)| -> FidelityResult<(usize, usize, SegmentFidelity)> {
                let a = segment_path(segment_dir, &records[members[i]], segment);
                let b = segment_path(segment_dir, &records[members[j]], segment);
                let fidelity = correlator.correlate(&a, &b)?;
                tracing::trace!(
                    "{} vs {} segment {}: score {:.3}, delay {}",
                    records[members[i]].label(),
                    records[members[j]].label(),
                    segment.index,
                    fidelity.score,
                    fidelity.delay_samples
                );
                Ok((i, j, fidelity))
            })
            .collect()
    })
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::HashMap;
    use std::path::Path;

    use parking_lot::Mutex;

    use super::super::types::{FidelityCorrelator, FidelityError, FidelityResult, SegmentFidelity};

    /// Answers by the stream orders embedded in segment file names
    /// (`<slot>_<order>_<segment>.wav`).
    #[derive(Default)]
    pub struct ScriptedCorrelator {
        answers: HashMap<(u32, u32), SegmentFidelity>,
        fail: bool,
        pub calls: Mutex<usize>,
    }

    impl ScriptedCorrelator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn pair(mut self, a: u32, b: u32, score: f64, delay: i64) -> Self {
            let fidelity = SegmentFidelity {
                score,
                secondary: 0.0,
                delay_samples: delay,
            };
            self.answers.insert((a.min(b), a.max(b)), fidelity);
            self
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn order(path: &Path) -> u32 {
            path.file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.split('_').nth(1))
                .and_then(|s| s.parse().ok())
                .unwrap_or(u32::MAX)
        }
    }

    impl FidelityCorrelator for ScriptedCorrelator {
        fn name(&self) -> &str {
            "scripted"
        }

        fn correlate(&self, reference: &Path, other: &Path) -> FidelityResult<SegmentFidelity> {
            *self.calls.lock() += 1;
            if self.fail {
                return Err(FidelityError::Correlation("scripted failure".to_string()));
            }
            let (a, b) = (Self::order(reference), Self::order(other));
            Ok(self
                .answers
                .get(&(a.min(b), a.max(b)))
                .copied()
                .unwrap_or(SegmentFidelity {
                    score: 0.1,
                    secondary: 0.0,
                    delay_samples: 0,
                }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedCorrelator;
    use super::*;
    use crate::models::fixtures::audio;
    use crate::runner::fake::FakeRunner;
    use crate::runner::ToolOutput;
    use tempfile::tempdir;

    fn settings() -> FidelitySettings {
        FidelitySettings::default()
    }

    #[test]
    fn correlates_every_pair_and_segment() {
        let dir = tempdir().unwrap();
        let segment_dir = dir.path().join("audio_eng");
        let records = vec![
            audio(1, "eng", "ac3", 6, 48000, 448_000),
            audio(2, "eng", "ac3", 6, 44100, 384_000),
            audio(3, "eng", "dts", 6, 48000, 1_536_000),
        ];
        let runner = FakeRunner::new();
        let correlator = ScriptedCorrelator::new().pair(1, 2, 0.95, 0);

        let comparison = compare_group(
            &runner,
            &correlator,
            &records,
            &[0, 1, 2],
            |_| Path::new("in.mkv"),
            &settings(),
            &segment_dir,
        )
        .unwrap()
        .unwrap();

        // 4 cuts + midpoint, 3 pairs
        assert_eq!(*correlator.calls.lock(), 15);
        assert_eq!(runner.calls().len(), 15);
        assert_eq!(comparison.matrix.pair_count(), 3);
        assert_eq!(comparison.matrix.get(0, 1)[0].score, 0.95);
        assert_eq!(comparison.profile.sample_rate, 44100);
        assert!(runner.calls()[0].args.contains(&"44100".to_string()));
        assert!(!segment_dir.exists());
    }

    #[test]
    fn single_comparable_member_is_skipped() {
        let dir = tempdir().unwrap();
        let mut incomplete = audio(2, "eng", "ac3", 6, 48000, 448_000);
        incomplete.duration_secs = None;
        let records = vec![audio(1, "eng", "ac3", 6, 48000, 448_000), incomplete];
        let runner = FakeRunner::new();

        let result = compare_group(
            &runner,
            &ScriptedCorrelator::new(),
            &records,
            &[0, 1],
            |_| Path::new("in.mkv"),
            &settings(),
            dir.path(),
        )
        .unwrap();
        assert!(result.is_none());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn extraction_failure_removes_segment_dir() {
        let dir = tempdir().unwrap();
        let segment_dir = dir.path().join("audio_eng");
        let records = vec![
            audio(1, "eng", "ac3", 6, 48000, 448_000),
            audio(2, "eng", "ac3", 6, 48000, 448_000),
        ];
        let runner = FakeRunner::new().on(
            |_| true,
            ToolOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "Invalid data found when processing input".into(),
            },
        );

        let err = compare_group(
            &runner,
            &ScriptedCorrelator::new(),
            &records,
            &[0, 1],
            |_| Path::new("in.mkv"),
            &settings(),
            &segment_dir,
        )
        .unwrap_err();
        assert!(matches!(err, FidelityError::Extraction(_)));
        assert!(!segment_dir.exists());
    }

    #[test]
    fn correlation_failure_is_reported() {
        let dir = tempdir().unwrap();
        let records = vec![
            audio(1, "eng", "ac3", 6, 48000, 448_000),
            audio(2, "eng", "ac3", 6, 48000, 448_000),
        ];
        let result = compare_group(
            &FakeRunner::new(),
            &ScriptedCorrelator::failing(),
            &records,
            &[0, 1],
            |_| Path::new("in.mkv"),
            &settings(),
            &dir.path().join("seg"),
        );
        assert!(matches!(result, Err(FidelityError::Correlation(_))));
    }
}
