//! Interpretation of mkvmerge exit codes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Tool;
use crate::runner::{RunError, RunResult, ToolOutput};

/// The one warning that does not make exit code 1 a failure: fragments
/// produced independently can carry colliding track UIDs.
static UID_REALLOCATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^Warning:.+Could not keep a track's UID \d+ because it is already allocated for another track\. A new random UID will be allocated automatically\.",
    )
    .expect("valid regex")
});

/// How a multiplex invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxOutcome {
    Clean,
    /// Exit code 1 with only UID reallocation warnings.
    UidWarnings(usize),
}

fn is_diagnostic(line: &str) -> bool {
    line.starts_with("Warning:") || line.starts_with("Error:")
}

/// Accept exit 0, and exit 1 when every diagnostic line is the UID warning.
pub fn check_mkvmerge(output: &ToolOutput) -> RunResult<MuxOutcome> {
    match output.exit_code {
        0 => Ok(MuxOutcome::Clean),
        1 => {
            let diagnostics: Vec<&str> = output
                .lines()
                .map(str::trim_end)
                .filter(|l| is_diagnostic(l))
                .collect();
            match diagnostics.iter().find(|l| !UID_REALLOCATED.is_match(l)) {
                None => Ok(MuxOutcome::UidWarnings(diagnostics.len())),
                Some(line) => Err(RunError::failed(Tool::Mkvmerge, 1, line.to_string())),
            }
        }
        code => Err(RunError::failed(Tool::Mkvmerge, code, output.diagnostic())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UID_LINE: &str = "Warning: 'source_1_tmp.mkv' track 0: Could not keep a track's UID 1234567 because it is already allocated for another track. A new random UID will be allocated automatically.";

    fn output(exit_code: i32, stdout: &str, stderr: &str) -> ToolOutput {
        ToolOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn uid_warnings_only_is_success() {
        let stderr = format!("{}\n{}\n", UID_LINE, UID_LINE.replace("1234567", "89"));
        let out = output(1, "Progress: 100%\nMultiplexing took 3 seconds.\n", &stderr);
        assert_eq!(check_mkvmerge(&out).unwrap(), MuxOutcome::UidWarnings(2));
    }

    #[test]
    fn other_warning_fails() {
        let stdout = format!("{}\nWarning: The track 2 has no language.\n", UID_LINE);
        let err = check_mkvmerge(&output(1, &stdout, "")).unwrap_err();
        assert!(err.to_string().contains("has no language"));
    }

    #[test]
    fn exit_two_fails_even_with_uid_lines() {
        assert!(check_mkvmerge(&output(2, UID_LINE, "Error: could not open")).is_err());
        assert_eq!(check_mkvmerge(&output(0, "", "")).unwrap(), MuxOutcome::Clean);
    }

    #[test]
    fn exit_one_without_diagnostics_is_accepted() {
        assert_eq!(
            check_mkvmerge(&output(1, "Done.\n", "")).unwrap(),
            MuxOutcome::UidWarnings(0)
        );
    }
}
