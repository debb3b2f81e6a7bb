//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use super::manager::{ConfigError, ConfigResult};
use crate::logging::LogLevel;
use crate::rules::RuleGraph;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Working and log directories.
    #[serde(default)]
    pub paths: PathSettings,

    /// External tool executables.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Track selection policy.
    #[serde(default)]
    pub merge: MergeSettings,

    /// Audio duplicate detection.
    #[serde(default)]
    pub fidelity: FidelitySettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Check values that would make a run meaningless and compile the rule graph.
    ///
    /// Called before any work starts; a failure here aborts the run.
    pub fn validate(&self) -> ConfigResult<RuleGraph> {
        if self.merge.max_streams == 0 {
            return Err(ConfigError::Invalid(
                "merge.max_streams must be at least 1".to_string(),
            ));
        }
        if self.fidelity.enabled && self.fidelity.cuts == 0 {
            return Err(ConfigError::Invalid(
                "fidelity.cuts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fidelity.min_score) {
            return Err(ConfigError::Invalid(format!(
                "fidelity.min_score must be within 0..=1, got {}",
                self.fidelity.min_score
            )));
        }
        if self.merge.undetermined_language.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "merge.undetermined_language must not be empty".to_string(),
            ));
        }
        Ok(RuleGraph::parse(&self.merge.format_rules)?)
    }
}

/// Path configuration for temp and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root folder under which each run creates its own work directory.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for per-job log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_temp_root() -> String {
    "/tmp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Executable names or absolute paths of the media tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_mkvmerge")]
    pub mkvmerge: String,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_mkvmerge() -> String {
    "mkvmerge".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            mkvmerge: default_mkvmerge(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Track selection and output policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSettings {
    /// Format dominance chains, e.g. `truehd=flac>eac3*1.2>ac3`.
    #[serde(default = "default_format_rules")]
    pub format_rules: String,

    /// Languages whose subtitles are pruned last.
    #[serde(default)]
    pub always_keep_languages: Vec<String>,

    /// Languages pruned after excluded ones but before always-keep ones.
    #[serde(default)]
    pub try_keep_languages: Vec<String>,

    /// Maximum number of audio + subtitle streams in the output.
    #[serde(default = "default_max_streams")]
    pub max_streams: usize,

    /// Language written in place of "und" when `change_all_und` is set.
    #[serde(default = "default_undetermined_language")]
    pub undetermined_language: String,

    /// Retag undetermined-language audio with `undetermined_language`.
    #[serde(default)]
    pub change_all_und: bool,

    /// Re-encode uncommon audio formats to AAC (libfdk_aac).
    #[serde(default)]
    pub louis: bool,

    /// Re-encode lossless audio to FLAC.
    #[serde(default = "default_true")]
    pub flac_lossless: bool,

    /// Drop subtitles of languages outside `always_keep_languages` up front.
    #[serde(default)]
    pub remove_subtitles_outside_keep: bool,

    /// Conversion worker count; 0 uses available parallelism.
    #[serde(default)]
    pub workers: usize,
}

fn default_format_rules() -> String {
    "truehd=dts-hd ma=flac=pcm>dts>eac3*1.2>ac3*1.2>opus=aac>mp3".to_string()
}

fn default_max_streams() -> usize {
    30
}

fn default_undetermined_language() -> String {
    "und".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            format_rules: default_format_rules(),
            always_keep_languages: Vec::new(),
            try_keep_languages: Vec::new(),
            max_streams: default_max_streams(),
            undetermined_language: default_undetermined_language(),
            change_all_und: false,
            louis: false,
            flac_lossless: true,
            remove_subtitles_outside_keep: false,
            workers: 0,
        }
    }
}

impl MergeSettings {
    /// Worker count with 0 resolved to available parallelism.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// Audio duplicate detection via segment correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FidelitySettings {
    /// Run correlation for language groups with several audio tracks.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Evenly spaced cuts (the double-length segment comes on top).
    #[serde(default = "default_cuts")]
    pub cuts: usize,

    /// Upper bound of one segment in seconds.
    #[serde(default = "default_max_window_secs")]
    pub max_window_secs: f64,

    /// Minimum mean score for a duplicate.
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Delays at or above this many samples rule a pair out.
    #[serde(default = "default_max_delay_samples")]
    pub max_delay_samples: i64,
}

fn default_cuts() -> usize {
    4
}

fn default_max_window_secs() -> f64 {
    60.0
}

fn default_min_score() -> f64 {
    0.90
}

fn default_max_delay_samples() -> i64 {
    128
}

impl Default for FidelitySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cuts: default_cuts(),
            max_window_secs: default_max_window_secs(),
            min_score: default_min_score(),
            max_delay_samples: default_max_delay_samples(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level for the global subscriber and job log.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines to show after a failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Show mkvmerge options in pretty format.
    #[serde(default)]
    pub show_options_pretty: bool,

    /// Show mkvmerge options as raw JSON.
    #[serde(default)]
    pub show_options_json: bool,
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_options_pretty: false,
            show_options_json: false,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Tools,
    Merge,
    Fidelity,
    Logging,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 5] = [
        ConfigSection::Paths,
        ConfigSection::Tools,
        ConfigSection::Merge,
        ConfigSection::Fidelity,
        ConfigSection::Logging,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Tools => "tools",
            ConfigSection::Merge => "merge",
            ConfigSection::Fidelity => "fidelity",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment line written above the section.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "# Working and log directories",
            ConfigSection::Tools => "# External tool executables",
            ConfigSection::Merge => "# Track selection policy",
            ConfigSection::Fidelity => "# Audio duplicate detection",
            ConfigSection::Logging => "# Logging configuration",
        }
    }
}
