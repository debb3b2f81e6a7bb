//! Shared fixtures for orchestrator tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use super::types::{Context, MergeInputs, MergeSession, WorkerPools};
use crate::config::Settings;
use crate::fidelity::ScriptedCorrelator;
use crate::logging::{JobLogger, LogConfig};
use crate::models::{Invocation, Tool};
use crate::runner::fake::FakeRunner;
use crate::runner::ToolOutput;

pub(crate) struct Harness {
    pub dir: TempDir,
    pub ctx: Context,
    pub runner: Arc<FakeRunner>,
    pub correlator: Arc<ScriptedCorrelator>,
}

impl Harness {
    pub fn session(&self) -> MergeSession {
        MergeSession::new("test-job", WorkerPools::new(2).unwrap())
    }

    pub fn calls(&self, tool: Tool) -> Vec<Invocation> {
        self.runner
            .calls()
            .into_iter()
            .filter(|c| c.tool == tool)
            .collect()
    }
}

/// Harness with a runner that answers every call with empty success.
pub(crate) fn test_context() -> Harness {
    harness(FakeRunner::new(), ScriptedCorrelator::new(), Settings::default())
}

pub(crate) fn harness(
    runner: FakeRunner,
    correlator: ScriptedCorrelator,
    settings: Settings,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.mkv");
    let enriched = dir.path().join("enriched.mkv");
    fs::write(&source, b"source").unwrap();
    fs::write(&enriched, b"enriched").unwrap();

    let inputs = MergeInputs {
        source,
        enriched,
        output: dir.path().join("out").join("merged.mkv"),
    };
    let logger = JobLogger::new("test-job", dir.path().join("logs"), LogConfig::default(), None)
        .unwrap();
    let rules = settings.validate().unwrap();

    let runner = Arc::new(runner);
    let correlator = Arc::new(correlator);
    let ctx = Context::new(
        settings,
        rules,
        "test-job",
        inputs,
        dir.path().join("mkv_insert_test"),
        Arc::new(logger),
        runner.clone(),
        correlator.clone(),
    );

    Harness {
        dir,
        ctx,
        runner,
        correlator,
    }
}

/// Matches the ffprobe call for the file named `name`.
pub(crate) fn probes(name: &'static str) -> impl Fn(&Invocation) -> bool + Send + Sync {
    move |inv: &Invocation| {
        inv.tool == Tool::Ffprobe
            && inv
                .args
                .last()
                .is_some_and(|p| Path::new(p).file_name().is_some_and(|f| f == name))
    }
}

/// Matches the mkvmerge call writing to a file named `name`.
pub(crate) fn writes(name: &'static str) -> impl Fn(&Invocation) -> bool + Send + Sync {
    move |inv: &Invocation| {
        inv.tool == Tool::Mkvmerge
            && inv
                .args
                .get(1)
                .is_some_and(|p| Path::new(p).file_name().is_some_and(|f| f == name))
    }
}

pub(crate) fn json_output(value: Value) -> ToolOutput {
    ToolOutput {
        exit_code: 0,
        stdout: value.to_string(),
        stderr: String::new(),
    }
}

pub(crate) fn uid_warnings(count: usize) -> ToolOutput {
    let line = "Warning: 'fragment.mkv' track 0: Could not keep a track's UID 42 because it is already allocated for another track. A new random UID will be allocated automatically.";
    ToolOutput {
        exit_code: 1,
        stdout: vec![line; count].join("\n"),
        stderr: String::new(),
    }
}
