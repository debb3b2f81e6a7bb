//! Stream probing with ffprobe.
//!
//! Turns `ffprobe -show_streams -show_format` JSON into [`StreamRecord`]s:
//! audio and subtitle streams become records, the first video stream only
//! contributes the production language.

mod streams;

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::models::{Invocation, SourceSlot, StreamRecord, Tool};
use crate::runner::{RunError, ToolRunner};

pub use streams::{normalize_audio_format, normalize_language, AUDIO_PASSTHROUGH_FORMATS};

/// Errors while probing one input file.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("Failed to parse ffprobe output for {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ffprobe output for {0} has no stream list")]
    NoStreams(PathBuf),
}

/// Result type for probing.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Everything the merge pass needs from one input file.
#[derive(Debug, Clone)]
pub struct ProbedFile {
    pub path: PathBuf,
    pub slot: SourceSlot,
    /// Container duration in seconds.
    pub duration_secs: Option<f64>,
    /// Normalized language of the first video stream.
    pub video_language: Option<String>,
    /// Audio and subtitle records in stream order.
    pub records: Vec<StreamRecord>,
    /// Streams that could not be turned into records.
    pub skipped: usize,
}

impl ProbedFile {
    /// Production language: the video language unless undetermined.
    pub fn original_language(&self) -> Option<&str> {
        self.video_language.as_deref().filter(|l| *l != "und")
    }
}

/// Invocation used to probe `path`.
pub fn probe_invocation(path: &Path) -> Invocation {
    Invocation::new(Tool::Ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path.to_string_lossy())
}

/// Probe one input file.
pub fn probe_file(runner: &dyn ToolRunner, slot: SourceSlot, path: &Path) -> ProbeResult<ProbedFile> {
    if !path.exists() {
        return Err(ProbeError::FileNotFound(path.to_path_buf()));
    }

    tracing::debug!("Probing {} file: {}", slot, path.display());

    let output = runner.run(&probe_invocation(path))?.checked(Tool::Ffprobe)?;
    let json: Value = serde_json::from_str(&output.stdout).map_err(|source| ProbeError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    parse_probe_json(&json, slot, path)
}

/// Parse ffprobe JSON into a [`ProbedFile`].
pub fn parse_probe_json(json: &Value, slot: SourceSlot, path: &Path) -> ProbeResult<ProbedFile> {
    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .ok_or_else(|| ProbeError::NoStreams(path.to_path_buf()))?;

    let duration_secs = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(streams::number);

    let mut probed = ProbedFile {
        path: path.to_path_buf(),
        slot,
        duration_secs,
        video_language: None,
        records: Vec::new(),
        skipped: 0,
    };

    for stream in streams {
        match stream.get("codec_type").and_then(|t| t.as_str()) {
            Some("video") => {
                if probed.video_language.is_none() && !streams::is_attached_picture(stream) {
                    probed.video_language = Some(streams::language(stream));
                }
            }
            Some("audio") => match streams::parse_audio(stream, slot) {
                Some(record) => probed.records.push(fill_duration(record, duration_secs)),
                None => probed.skipped += 1,
            },
            Some("subtitle") => match streams::parse_subtitle(stream, slot) {
                Some(record) => probed.records.push(fill_duration(record, duration_secs)),
                None => probed.skipped += 1,
            },
            _ => {}
        }
    }

    if probed.skipped > 0 {
        tracing::warn!(
            "{}: {} stream(s) without index or codec were ignored",
            path.display(),
            probed.skipped
        );
    }

    Ok(probed)
}

fn fill_duration(record: StreamRecord, container: Option<f64>) -> StreamRecord {
    match (record.duration_secs, container) {
        (None, Some(secs)) => record.with_duration(secs),
        _ => record,
    }
}
