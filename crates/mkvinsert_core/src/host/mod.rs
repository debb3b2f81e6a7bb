//! Surface for a media-library host that schedules merge jobs.
//!
//! The host decides which library files become jobs ([`FileTest`]) and
//! launches one `mkv-insert` process per job ([`WorkerRequest`]).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local};
use regex::{Regex, RegexBuilder};

/// Name patterns accepted when none are configured.
pub const DEFAULT_NAME_PATTERNS: &str = r".*\.mkv$,.*\.mp4$,.*\.avi$";

/// Outcome of testing one library file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDecision {
    /// Queue the file for processing.
    Pending,
    Skip(String),
}

/// Library file filter.
///
/// Patterns are comma-separated regular expressions matched against the
/// file name from its first character.
#[derive(Debug, Clone)]
pub struct FileTest {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    min_age_days: u32,
}

fn compile(patterns: &str, case_sensitive: bool) -> Result<Vec<Regex>, regex::Error> {
    patterns
        .split(',')
        .filter(|p| !p.is_empty())
        .map(|p| {
            RegexBuilder::new(&format!("^(?:{})", p))
                .case_insensitive(!case_sensitive)
                .build()
        })
        .collect()
}

impl FileTest {
    pub fn new(
        name_patterns: &str,
        exclude_patterns: &str,
        case_sensitive: bool,
        min_age_days: u32,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            include: compile(name_patterns, case_sensitive)?,
            exclude: compile(exclude_patterns, case_sensitive)?,
            min_age_days,
        })
    }

    /// Decide whether `path` should become a job.
    ///
    /// The file is only stat'ed when a minimum age is configured.
    pub fn check(&self, path: &Path) -> io::Result<FileDecision> {
        if self.min_age_days > 0 {
            let modified: DateTime<Local> = fs::metadata(path)?.modified()?.into();
            let cutoff = Local::now() - Duration::days(i64::from(self.min_age_days));
            if modified >= cutoff {
                return Ok(FileDecision::Skip(format!(
                    "File '{}' is younger than {} day(s).",
                    path.display(),
                    self.min_age_days
                )));
            }
        }
        Ok(self.check_name(path))
    }

    /// Pattern part of [`check`](Self::check).
    pub fn check_name(&self, path: &Path) -> FileDecision {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(include) = self.include.iter().find(|re| re.is_match(&name)) else {
            return FileDecision::Skip(format!(
                "File '{}' does not match any include patterns.",
                path.display()
            ));
        };
        tracing::debug!("{} matches name pattern '{}'", path.display(), include.as_str());

        if let Some(exclude) = self.exclude.iter().find(|re| re.is_match(&name)) {
            return FileDecision::Skip(format!(
                "File '{}' matches exclude pattern '{}'.",
                path.display(),
                exclude.as_str()
            ));
        }
        FileDecision::Pending
    }
}

/// What the host hands over for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    /// Enriched variant produced by earlier processing.
    pub file_in: PathBuf,
    pub file_out: PathBuf,
    /// Original library file.
    pub original_file_path: PathBuf,
    pub louis: bool,
}

impl WorkerRequest {
    /// Command line the host should execute.
    pub fn exec_command(&self) -> Vec<String> {
        let mut command = vec![
            "mkv-insert".to_string(),
            "-o".to_string(),
            self.file_out.to_string_lossy().into_owned(),
            "-s".to_string(),
            self.original_file_path.to_string_lossy().into_owned(),
            "-f".to_string(),
            self.file_in.to_string_lossy().into_owned(),
        ];
        if self.louis {
            command.push("-l".to_string());
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn defaults() -> FileTest {
        FileTest::new(DEFAULT_NAME_PATTERNS, "", true, 0).unwrap()
    }

    #[test]
    fn default_patterns_accept_video_files() {
        let test = defaults();
        assert_eq!(test.check_name(Path::new("/lib/Movie (2001).mkv")), FileDecision::Pending);
        assert!(matches!(
            test.check_name(Path::new("/lib/Movie.nfo")),
            FileDecision::Skip(_)
        ));
        // Case sensitive by default.
        assert!(matches!(
            test.check_name(Path::new("/lib/Movie.MKV")),
            FileDecision::Skip(_)
        ));
    }

    #[test]
    fn exclude_wins_over_include() {
        let test = FileTest::new(r".*\.mkv$", "sample,.*trailer", false, 0).unwrap();
        assert_eq!(test.check_name(Path::new("Movie.MKV")), FileDecision::Pending);
        match test.check_name(Path::new("Sample-movie.mkv")) {
            FileDecision::Skip(reason) => assert!(reason.contains("sample")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            test.check_name(Path::new("movie-Trailer.mkv")),
            FileDecision::Skip(_)
        ));
    }

    #[test]
    fn patterns_anchor_at_start_of_name() {
        let test = FileTest::new("movie", "", true, 0).unwrap();
        assert_eq!(test.check_name(Path::new("/a/movie.mkv")), FileDecision::Pending);
        assert!(matches!(
            test.check_name(Path::new("/a/the movie.mkv")),
            FileDecision::Skip(_)
        ));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(FileTest::new("(", "", true, 0).is_err());
    }

    #[test]
    fn fresh_files_are_skipped_when_age_is_required() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.mkv");
        fs::write(&path, b"x").unwrap();

        let test = FileTest::new(DEFAULT_NAME_PATTERNS, "", true, 7).unwrap();
        match test.check(&path).unwrap() {
            FileDecision::Skip(reason) => assert!(reason.contains("younger")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(defaults().check(&path).unwrap(), FileDecision::Pending);
        assert!(test.check(&dir.path().join("missing.mkv")).is_err());
    }

    #[test]
    fn worker_request_builds_command() {
        let request = WorkerRequest {
            file_in: PathBuf::from("/cache/enriched.mkv"),
            file_out: PathBuf::from("/cache/out.mkv"),
            original_file_path: PathBuf::from("/lib/movie.mkv"),
            louis: true,
        };
        assert_eq!(
            request.exec_command(),
            vec![
                "mkv-insert",
                "-o",
                "/cache/out.mkv",
                "-s",
                "/lib/movie.mkv",
                "-f",
                "/cache/enriched.mkv",
                "-l"
            ]
        );

        let plain = WorkerRequest {
            louis: false,
            ..request
        };
        assert_eq!(plain.exec_command().len(), 7);
    }
}
