//! Core types for the orchestrator pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Serialize;

use crate::config::Settings;
use crate::fidelity::FidelityCorrelator;
use crate::logging::JobLogger;
use crate::models::{MergePlan, SourceSlot, StreamRecord, TrackGroup, TrackKind};
use crate::mux::{ConvertOptions, DefaultAudioSlot, EmitConfig, Fragment, MuxOutcome};
use crate::rules::RuleGraph;
use crate::runner::ToolRunner;
use crate::subtitles::LanguagePolicy;

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// The two input files and the output path of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeInputs {
    /// Original source; supplies chapters and global metadata.
    pub source: PathBuf,
    /// Previously produced variant; supplies the video.
    pub enriched: PathBuf,
    pub output: PathBuf,
}

impl MergeInputs {
    pub fn path(&self, slot: SourceSlot) -> &Path {
        match slot {
            SourceSlot::Source => &self.source,
            SourceSlot::Enriched => &self.enriched,
        }
    }
}

/// Read-only context passed to pipeline steps.
///
/// Contains run configuration and shared collaborators that steps can read
/// but not modify. Mutable state goes in `MergeSession`.
pub struct Context {
    /// Application settings, with command-line overrides applied.
    pub settings: Settings,
    /// Compiled format dominance rules.
    pub rules: RuleGraph,
    /// Job name/identifier.
    pub job_name: String,
    pub inputs: MergeInputs,
    /// Run-specific working directory (under temp_root).
    pub work_dir: PathBuf,
    /// Per-job logger.
    pub logger: Arc<JobLogger>,
    /// Executes mkvmerge/ffmpeg/ffprobe.
    pub runner: Arc<dyn ToolRunner>,
    /// Compares decoded audio segments.
    pub correlator: Arc<dyn FidelityCorrelator>,
    /// Optional progress callback.
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        rules: RuleGraph,
        job_name: impl Into<String>,
        inputs: MergeInputs,
        work_dir: PathBuf,
        logger: Arc<JobLogger>,
        runner: Arc<dyn ToolRunner>,
        correlator: Arc<dyn FidelityCorrelator>,
    ) -> Self {
        Self {
            settings,
            rules,
            job_name: job_name.into(),
            inputs,
            work_dir,
            logger,
            runner,
            correlator,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Report progress to callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    /// Keep-list tiers from the merge settings.
    pub fn language_policy(&self) -> LanguagePolicy {
        LanguagePolicy::from_settings(&self.settings.merge)
    }

    /// Plan inputs for the current session.
    pub fn emit_config(&self, session: &MergeSession) -> EmitConfig {
        let merge = &self.settings.merge;
        EmitConfig {
            work_dir: self.work_dir.clone(),
            source: self.inputs.source.clone(),
            enriched: self.inputs.enriched.clone(),
            output: self.inputs.output.clone(),
            convert: ConvertOptions {
                threads: session.pools.workers,
                duration_secs: session.duration_secs,
                louis: merge.louis,
                flac_lossless: merge.flac_lossless,
            },
            change_all_und: merge.change_all_und,
            undetermined_language: merge.undetermined_language.clone(),
            original_language: session.original_language.clone(),
        }
    }
}

/// Worker pools owned by one session.
#[derive(Debug)]
pub struct WorkerPools {
    /// Hashing, extraction and conversion.
    pub conversion: ThreadPool,
    /// Multiplexing; a single thread so mkvmerge runs never overlap.
    pub mux: ThreadPool,
    pub workers: usize,
}

impl WorkerPools {
    pub fn new(workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let workers = workers.max(1);
        let conversion = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("convert-{}", i))
            .build()?;
        let mux = ThreadPoolBuilder::new()
            .num_threads(1)
            .thread_name(|_| "mux".to_string())
            .build()?;
        Ok(Self {
            conversion,
            mux,
            workers,
        })
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub probed: usize,
    pub fingerprint_duplicates: usize,
    pub fidelity_duplicates: usize,
    pub subtitles_outside_keep: usize,
    pub forced_collapsed: usize,
    pub budget_dropped: usize,
    pub converted_duplicates: usize,
    pub kept: usize,
    /// UID warnings accepted from mkvmerge runs.
    pub uid_warnings: usize,
}

/// Mutable state of one merge run.
///
/// Owns the worker pools and the default-audio slot; nothing here is
/// shared between runs.
#[derive(Debug)]
pub struct MergeSession {
    pub job_id: String,
    pub started_at: String,
    pub pools: WorkerPools,
    /// Records of both files, source first, in stream order.
    pub records: Vec<StreamRecord>,
    pub groups: BTreeMap<TrackKind, TrackGroup>,
    /// Production language from the source's video track.
    pub original_language: Option<String>,
    /// Source duration; fragments are cut to it.
    pub duration_secs: Option<f64>,
    pub fragments: Vec<Fragment>,
    pub default_audio: DefaultAudioSlot,
    pub plan: Option<MergePlan>,
    pub summary: MergeSummary,
}

impl MergeSession {
    pub fn new(job_id: impl Into<String>, pools: WorkerPools) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: chrono::Local::now().to_rfc3339(),
            pools,
            records: Vec::new(),
            groups: BTreeMap::new(),
            original_language: None,
            duration_secs: None,
            fragments: Vec::new(),
            default_audio: DefaultAudioSlot::new(),
            plan: None,
            summary: MergeSummary::default(),
        }
    }

    /// Records still kept.
    pub fn kept(&self) -> impl Iterator<Item = &StreamRecord> {
        self.records.iter().filter(|r| r.keep())
    }

    /// Mux outcome bookkeeping.
    pub(crate) fn note_mux(&mut self, outcome: MuxOutcome) {
        if let MuxOutcome::UidWarnings(n) = outcome {
            self.summary.uid_warnings += n;
        }
    }
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (preconditions not met, but not an error).
    Skipped(String),
}
