//! Errors raised while running a merge.
//!
//! A [`StepError`] says what went wrong inside one step; the pipeline
//! wraps it in a [`PipelineError`] naming the job and the step.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::probe::ProbeError;
use crate::runner::RunError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job '{job_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        job_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// The work directory could not be created.
    #[error("Job '{job_name}' could not create work directory {}: {source}", path.display())]
    WorkDir {
        job_name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn step_failed(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_name: job_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    /// Name of the step that failed, if a step failed.
    pub fn step_name(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step_name, .. } => Some(step_name),
            Self::WorkDir { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    /// An input file is missing or unusable.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// The step left the session in a state later steps cannot use.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// An earlier step did not record what this one needs.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),

    /// ffprobe, ffmpeg or mkvmerge failed; fatal outside optional steps.
    #[error(transparent)]
    Tool(#[from] RunError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

pub type StepResult<T> = Result<T, StepError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tool;

    #[test]
    fn tool_failure_keeps_exit_code() {
        let err: StepError = RunError::failed(Tool::Mkvmerge, 2, "Invalid track ID").into();
        let msg = err.to_string();
        assert!(msg.contains("mkvmerge"));
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("Invalid track ID"));
        assert!(matches!(
            err,
            StepError::Tool(RunError::Failed { tool: Tool::Mkvmerge, exit_code: 2, .. })
        ));
    }

    #[test]
    fn pipeline_error_names_job_and_step() {
        let err = PipelineError::step_failed(
            "movie_xyz",
            "Final mux",
            StepError::precondition_failed("no merge plan"),
        );
        assert_eq!(err.step_name(), Some("Final mux"));

        let msg = err.to_string();
        assert!(msg.contains("movie_xyz"));
        assert!(msg.contains("Final mux"));
        assert!(msg.contains("no merge plan"));
    }

    #[test]
    fn work_dir_error_shows_path() {
        let err = PipelineError::WorkDir {
            job_name: "movie".to_string(),
            path: PathBuf::from("/tmp/mkv_insert_x"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.step_name().is_none());
        assert!(err.to_string().contains("/tmp/mkv_insert_x"));
    }
}
