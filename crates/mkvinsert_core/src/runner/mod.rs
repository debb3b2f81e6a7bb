//! External process execution.
//!
//! Every mkvmerge/ffmpeg/ffprobe call goes through [`ToolRunner`] so the
//! pipeline can be driven by a fake runner in tests.

use std::io::{self, Read};
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::config::ToolSettings;
use crate::models::{Invocation, Tool};

#[cfg(test)]
pub(crate) mod fake;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout lines followed by stderr lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().chain(self.stderr.lines())
    }

    /// Turn a non-zero exit into [`RunError::Failed`].
    pub fn checked(self, tool: Tool) -> RunResult<ToolOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(RunError::failed(tool, self.exit_code, self.diagnostic()))
        }
    }

    /// Best message for an error report: stderr if present, else stdout.
    pub fn diagnostic(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// Errors from launching or running external tools.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: Tool,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with exit code {exit_code}: {message}")]
    Failed {
        tool: Tool,
        exit_code: i32,
        message: String,
    },

    #[error("I/O error while reading {tool} output: {source}")]
    Io {
        tool: Tool,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    pub fn failed(tool: Tool, exit_code: i32, message: impl Into<String>) -> Self {
        Self::Failed {
            tool,
            exit_code,
            message: message.into(),
        }
    }
}

/// Result type for process execution.
pub type RunResult<T> = Result<T, RunError>;

/// Executes invocations.
///
/// Implementations must be shareable across the worker pools.
pub trait ToolRunner: Send + Sync {
    /// Run to completion and capture output. A non-zero exit is not an error
    /// at this level; callers decide what an exit code means.
    fn run(&self, invocation: &Invocation) -> RunResult<ToolOutput>;

    /// Run and feed stdout to `sink` in chunks. Non-zero exit is an error.
    fn stream_stdout(
        &self,
        invocation: &Invocation,
        sink: &mut dyn FnMut(&[u8]),
    ) -> RunResult<()>;
}

/// Runs invocations as child processes.
pub struct ProcessRunner {
    tools: ToolSettings,
}

impl ProcessRunner {
    pub fn new(tools: ToolSettings) -> Self {
        Self { tools }
    }

    fn program(&self, tool: Tool) -> &str {
        match tool {
            Tool::Mkvmerge => &self.tools.mkvmerge,
            Tool::Ffmpeg => &self.tools.ffmpeg,
            Tool::Ffprobe => &self.tools.ffprobe,
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> RunResult<ToolOutput> {
        tracing::debug!("Running: {}", invocation.display());

        let output = Command::new(self.program(invocation.tool))
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RunError::Spawn {
                tool: invocation.tool,
                source,
            })?;

        Ok(ToolOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn stream_stdout(
        &self,
        invocation: &Invocation,
        sink: &mut dyn FnMut(&[u8]),
    ) -> RunResult<()> {
        let tool = invocation.tool;
        tracing::debug!("Streaming: {}", invocation.display());

        let mut child = Command::new(self.program(tool))
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunError::Spawn { tool, source })?;

        let mut stdout = child.stdout.take().ok_or_else(|| RunError::Io {
            tool,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "stdout not captured"),
        })?;

        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let n = stdout
                .read(&mut buffer)
                .map_err(|source| RunError::Io { tool, source })?;
            if n == 0 {
                break;
            }
            sink(&buffer[..n]);
        }

        let output = child
            .wait_with_output()
            .map_err(|source| RunError::Io { tool, source })?;
        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            return Err(RunError::failed(
                tool,
                exit_code,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}
