//! Pipeline orchestrator for one merge run.
//!
//! A run is a sequence of steps sharing a read-only [`Context`] and a
//! mutable [`MergeSession`]. Analysis steps narrow the stream records down
//! to a keep-set, the plan step turns that into commands, and the run
//! steps execute them.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── Step: Probe
//!     ├── Step: Fingerprint
//!     ├── Step: Audio dedup            (optional)
//!     ├── Step: Subtitles
//!     ├── Step: Plan                   <- dry run stops here
//!     ├── Step: Convert
//!     ├── Step: Intermediate mux
//!     ├── Step: Verify
//!     ├── Step: Converted duplicates   (optional)
//!     └── Step: Final mux
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mkvinsert_core::orchestrator::{create_standard_pipeline, Context, MergeSession, WorkerPools};
//!
//! let ctx = Context::new(settings, rules, "job", inputs, work_dir, logger, runner, correlator);
//! let mut session = MergeSession::new("job", WorkerPools::new(workers)?);
//!
//! let result = create_standard_pipeline().run_in_work_dir(&ctx, &mut session)?;
//! println!("Completed: {:?}", result.steps_completed);
//! ```

mod errors;
mod pipeline;
mod step;
pub mod steps;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{
    AudioDedupStep, ConvertStep, ConvertedDuplicatesStep, FinalMuxStep, FingerprintStep,
    IntermediateMuxStep, PlanStep, ProbeStep, SubtitlePruneStep, VerifyStep,
};
pub use types::{
    Context, MergeInputs, MergeSession, MergeSummary, ProgressCallback, StepOutcome, WorkerPools,
};

fn analysis_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(ProbeStep::new())
        .with_step(FingerprintStep::new())
        .with_step(AudioDedupStep::new())
        .with_step(SubtitlePruneStep::new())
        .with_step(PlanStep::new())
}

/// Create the full merge pipeline.
///
/// 1. Probe - list audio and subtitle streams of both inputs
/// 2. Fingerprint - drop bit-identical streams
/// 3. Audio dedup - drop audio that duplicates a better track
/// 4. Subtitles - keep-list filter, forced collapse, stream budget
/// 5. Plan - emit every command of the merge
/// 6. Convert - extract and normalize each kept track
/// 7. Intermediate mux - assemble the converted tracks
/// 8. Verify - decode the intermediate file
/// 9. Converted duplicates - drop styled copies of kept text subtitles
/// 10. Final mux - enriched video + kept tracks + source chapters
pub fn create_standard_pipeline() -> Pipeline {
    analysis_pipeline()
        .with_step(ConvertStep::new())
        .with_step(IntermediateMuxStep::new())
        .with_step(VerifyStep::new())
        .with_step(ConvertedDuplicatesStep::new())
        .with_step(FinalMuxStep::new())
}

/// Create the pipeline for a dry run: analysis and planning only.
///
/// Probing, hashing and correlation still run external tools; nothing is
/// extracted, converted or written.
pub fn create_dry_run_pipeline() -> Pipeline {
    analysis_pipeline()
}

#[cfg(test)]
mod tests {
    use super::testing::{harness, json_output, probes, uid_warnings, writes};
    use super::*;
    use crate::config::Settings;
    use crate::fidelity::ScriptedCorrelator;
    use crate::logging::{HostLogCallback, JobLogger, LogConfig};
    use crate::models::{PlanStage, SourceSlot, Tool};
    use crate::runner::fake::FakeRunner;
    use crate::runner::ToolOutput;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn source_probe() -> ToolOutput {
        json_output(json!({
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264",
                 "tags": {"language": "fre"}},
                {"index": 1, "codec_type": "audio", "codec_name": "eac3",
                 "channels": 6, "sample_rate": "48000", "bit_rate": "640000",
                 "tags": {"language": "fre"}},
                {"index": 2, "codec_type": "subtitle", "codec_name": "subrip",
                 "tags": {"language": "fre", "title": "Français"}}
            ],
            "format": {"duration": "1800.0"}
        }))
    }

    fn enriched_probe() -> ToolOutput {
        json_output(json!({
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "hevc",
                 "tags": {"language": "fre"}},
                {"index": 3, "codec_type": "audio", "codec_name": "truehd",
                 "channels": 8, "sample_rate": "48000",
                 "tags": {"language": "fre"}},
                {"index": 4, "codec_type": "subtitle", "codec_name": "ass",
                 "tags": {"language": "fre", "title": "Français"}}
            ],
            "format": {"duration": "1800.0"}
        }))
    }

    fn probing_runner() -> FakeRunner {
        FakeRunner::new()
            .on(probes("source.mkv"), source_probe())
            .on(probes("enriched.mkv"), enriched_probe())
    }

    #[test]
    fn standard_pipeline_order() {
        assert_eq!(
            create_standard_pipeline().step_names(),
            vec![
                "Probe",
                "Fingerprint",
                "Audio dedup",
                "Subtitles",
                "Plan",
                "Convert",
                "Intermediate mux",
                "Verify",
                "Converted duplicates",
                "Final mux",
            ]
        );
        assert_eq!(create_dry_run_pipeline().step_count(), 5);
    }

    #[test]
    fn dry_run_plans_without_running_mux_tools() {
        let h = harness(probing_runner(), ScriptedCorrelator::new(), Settings::default());
        let mut session = h.session();

        let result = create_dry_run_pipeline()
            .run_in_work_dir(&h.ctx, &mut session)
            .unwrap();
        assert!(result.steps_skipped.is_empty());

        // Distinct scores keep both audio tracks.
        assert_eq!(session.summary.probed, 4);
        assert_eq!(session.summary.kept, 4);
        assert_eq!(session.original_language.as_deref(), Some("fr"));

        let plan = session.plan.as_ref().unwrap();
        assert_eq!(plan.stage(PlanStage::Extract).count(), 4);
        assert_eq!(plan.stage(PlanStage::FinalMux).count(), 1);

        assert!(h.calls(Tool::Mkvmerge).is_empty());
        assert!(!h.ctx.inputs.output.exists());
        assert!(!h.ctx.work_dir.exists());
    }

    #[test]
    fn full_run_drops_duplicates_and_accepts_uid_warnings() {
        let runner = probing_runner()
            .on(writes("merged_split.mkv"), uid_warnings(2))
            .on(writes("merged.mkv"), uid_warnings(2))
            .on_stream(
                |inv| inv.tool == Tool::Ffmpeg && inv.args.iter().any(|a| a == "srt"),
                "1\n00:00:01,000 --> 00:00:02,000\nBonjour\n",
            );
        let correlator = ScriptedCorrelator::new().pair(1, 3, 0.97, 0);
        let h = harness(runner, correlator, Settings::default());
        let mut session = h.session();

        let result = create_standard_pipeline()
            .run_in_work_dir(&h.ctx, &mut session)
            .unwrap();
        assert_eq!(result.steps_completed.len(), 10);

        let summary = &session.summary;
        assert_eq!(summary.fidelity_duplicates, 1);
        assert_eq!(summary.converted_duplicates, 1);
        assert_eq!(summary.uid_warnings, 4);
        assert_eq!(summary.kept, 3);

        // The truehd track wins over eac3 at the same sample rate.
        let eac3 = session
            .records
            .iter()
            .find(|r| r.slot == SourceSlot::Source && r.stream_order == 1)
            .unwrap();
        assert!(eac3.drop_reason().unwrap().starts_with("fidelity duplicate"));

        // The styled subtitle sits at intermediate id 1 and is excluded.
        let final_mux = h.calls(Tool::Mkvmerge).pop().unwrap();
        assert!(final_mux.args[1].ends_with("merged.mkv"));
        assert!(final_mux.args.windows(2).any(|w| w == ["-s", "!1"]));
        assert!(h.ctx.inputs.output.parent().unwrap().is_dir());
        assert!(!h.ctx.work_dir.exists());
    }

    #[test]
    fn failed_verify_aborts_before_final_mux() {
        let runner = probing_runner().on(
            |inv| inv.tool == Tool::Ffmpeg && inv.args.iter().any(|a| a == "null"),
            ToolOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "Invalid data found when processing input".to_string(),
            },
        );
        let h = harness(runner, ScriptedCorrelator::new(), Settings::default());
        let mut session = h.session();

        let err = create_standard_pipeline()
            .run_in_work_dir(&h.ctx, &mut session)
            .unwrap_err();
        assert!(matches!(err, PipelineError::StepFailed { ref step_name, .. } if step_name == "Verify"));
        assert!(!h
            .calls(Tool::Mkvmerge)
            .iter()
            .any(|c| c.args[1].ends_with("merged.mkv")));
        assert!(!h.ctx.work_dir.exists());
    }

    #[test]
    fn correlation_failure_keeps_every_track() {
        let h = harness(probing_runner(), ScriptedCorrelator::failing(), Settings::default());
        let mut session = h.session();

        create_dry_run_pipeline()
            .run_in_work_dir(&h.ctx, &mut session)
            .unwrap();
        assert!(*h.correlator.calls.lock() > 0);
        assert_eq!(session.summary.fidelity_duplicates, 0);
        assert_eq!(session.summary.kept, 4);
    }

    #[test]
    fn misaligned_match_is_reported_and_kept() {
        let correlator = ScriptedCorrelator::new().pair(1, 3, 0.98, 4800);
        let mut h = harness(probing_runner(), correlator, Settings::default());

        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let callback: HostLogCallback = Box::new(move |line: &str| sink.lock().push(line.to_string()));
        h.ctx.logger = Arc::new(
            JobLogger::new("test-job", h.dir.path().join("logs"), LogConfig::default(), Some(callback))
                .unwrap(),
        );
        let mut session = h.session();

        create_dry_run_pipeline()
            .run_in_work_dir(&h.ctx, &mut session)
            .unwrap();
        assert_eq!(session.summary.fidelity_duplicates, 0);
        assert_eq!(session.summary.kept, 4);
        assert!(lines
            .lock()
            .iter()
            .any(|l| l.contains("[WARNING]") && l.contains("offset by [4800")));
    }

    #[test]
    fn missing_input_fails_probe() {
        let h = harness(probing_runner(), ScriptedCorrelator::new(), Settings::default());
        std::fs::remove_file(&h.ctx.inputs.enriched).unwrap();
        let mut session = h.session();

        let err = create_dry_run_pipeline()
            .run_in_work_dir(&h.ctx, &mut session)
            .unwrap_err();
        assert!(matches!(err, PipelineError::StepFailed { ref step_name, .. } if step_name == "Probe"));
        assert!(h.dir.path().join("logs").join("test-job.log").exists());
    }
}
