//! Per-job logger with file and host callback output.
//!
//! Each merge job gets its own logger that:
//! - Writes to a dedicated log file
//! - Forwards every line to the host callback (if provided)
//! - Keeps a tail of external tool output for failure reports
//! - Filters progress lines in compact mode

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{HostLogCallback, LogConfig, LogLevel, MessagePrefix};
use crate::models::Invocation;
use crate::runner::ToolOutput;

struct Sinks {
    file: Option<BufWriter<File>>,
    callback: Option<HostLogCallback>,
    tail: VecDeque<String>,
    last_progress: u32,
}

/// Per-job logger with dual output (file + host).
pub struct JobLogger {
    job_name: String,
    log_path: PathBuf,
    config: LogConfig,
    sinks: Mutex<Sinks>,
}

impl JobLogger {
    /// Create a logger writing to `<log_dir>/<job_name>.log`.
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<HostLogCallback>,
    ) -> std::io::Result<Self> {
        let job_name = job_name.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_name)));
        let file = BufWriter::new(File::create(&log_path)?);

        Ok(Self {
            job_name,
            log_path,
            sinks: Mutex::new(Sinks {
                file: Some(file),
                callback,
                tail: VecDeque::with_capacity(config.error_tail),
                last_progress: 0,
            }),
            config,
        })
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        let line = self.stamp(message);
        self.emit(&mut self.sinks.lock(), &line);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn section(&self, section_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Section.format(section_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Record a keep/drop decision on a track.
    pub fn decision(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Decision.format(message));
    }

    /// Log an invocation about to run.
    pub fn command(&self, invocation: &Invocation) {
        self.log(
            LogLevel::Info,
            &MessagePrefix::Command.format(&invocation.display()),
        );
    }

    /// Log progress. Returns false when compact mode filtered it.
    pub fn progress(&self, percent: u32) -> bool {
        let mut sinks = self.sinks.lock();
        if self.config.compact {
            let step = self.config.progress_step.max(1);
            let current_step = (percent / step) * step;
            let last_step = (sinks.last_progress / step) * step;
            if current_step <= last_step && percent < 100 {
                return false;
            }
            sinks.last_progress = percent;
        }
        if LogLevel::Info >= self.config.level {
            let line = self.stamp(&format!("Progress: {}%", percent));
            self.emit(&mut sinks, &line);
        }
        true
    }

    /// Feed one line of tool output. Compact mode only keeps it in the tail.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        let mut sinks = self.sinks.lock();
        if self.config.error_tail > 0 {
            if sinks.tail.len() >= self.config.error_tail {
                sinks.tail.pop_front();
            }
            sinks.tail.push_back(line.to_string());
        }
        if self.config.compact {
            return;
        }
        let prefix = if is_stderr { "[stderr] " } else { "" };
        let stamped = self.stamp(&format!("{}{}", prefix, line));
        self.emit(&mut sinks, &stamped);
    }

    /// Feed a whole captured tool output.
    pub fn tool_output(&self, output: &ToolOutput) {
        for line in output.stdout.lines() {
            self.output_line(line, false);
        }
        for line in output.stderr.lines() {
            self.output_line(line, true);
        }
    }

    /// Print the tail buffer, typically after a failure.
    pub fn show_tail(&self, header: &str) {
        let mut sinks = self.sinks.lock();
        if sinks.tail.is_empty() {
            return;
        }
        let lines: Vec<String> = std::iter::once(format!("[{}/tail]", header))
            .chain(sinks.tail.iter().cloned())
            .map(|l| self.stamp(&l))
            .collect();
        for line in lines {
            self.emit(&mut sinks, &line);
        }
    }

    pub fn tail(&self) -> Vec<String> {
        self.sinks.lock().tail.iter().cloned().collect()
    }

    pub fn clear_tail(&self) {
        self.sinks.lock().tail.clear();
    }

    /// Dump multiplexer tokens one per line.
    pub fn mkvmerge_options_pretty(&self, tokens: &[String]) {
        self.info("--- mkvmerge options (pretty) ---");
        self.info(crate::mux::format_tokens_pretty(tokens).trim_end());
        self.info("---------------------------------");
    }

    /// Dump multiplexer tokens as a JSON array.
    pub fn mkvmerge_options_json(&self, tokens: &[String]) {
        self.info("--- mkvmerge options (json) ---");
        if let Ok(json) = serde_json::to_string_pretty(tokens) {
            self.info(&json);
        }
        self.info("-------------------------------");
    }

    pub fn flush(&self) {
        if let Some(ref mut file) = self.sinks.lock().file {
            let _ = file.flush();
        }
    }

    /// Flush and close the file; the callback keeps working.
    pub fn close(&self) {
        let mut sinks = self.sinks.lock();
        if let Some(mut file) = sinks.file.take() {
            let _ = file.flush();
        }
    }

    fn stamp(&self, message: &str) -> String {
        if self.config.show_timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S"), message)
        } else {
            message.to_string()
        }
    }

    fn emit(&self, sinks: &mut Sinks, line: &str) {
        if let Some(ref mut file) = sinks.file {
            let _ = writeln!(file, "{}", line);
        }
        if let Some(ref callback) = sinks.callback {
            callback(line);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Replace characters that are not allowed in file names.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
