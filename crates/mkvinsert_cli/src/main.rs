//! mkv-insert - merge the audio and subtitle tracks of two releases.
//!
//! Invoked once per job: the enriched file supplies the video, the source
//! supplies chapters, and both supply candidate audio/subtitle tracks.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser};
use mkvinsert_core::config::{ConfigManager, Settings};
use mkvinsert_core::fidelity::WaveformCorrelator;
use mkvinsert_core::logging::{init_tracing, JobLogger, LogConfig, LogLevel};
use mkvinsert_core::orchestrator::{
    create_dry_run_pipeline, create_standard_pipeline, Context, MergeInputs, MergeSession,
    WorkerPools,
};
use mkvinsert_core::runner::ProcessRunner;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "mkv-insert: merge the audio and subtitles of two releases",
    long_about = "Keeps the best audio and subtitle tracks of an original source and an enriched \
                  variant, and writes them next to the enriched video in one Matroska file."
)]
struct Cli {
    /// Enriched variant; its video stream is kept
    #[arg(short = 'f', long = "file", value_name = "ENRICHED")]
    file: PathBuf,

    /// Original source; its chapters are kept
    #[arg(short = 's', long = "source", value_name = "SOURCE")]
    source: PathBuf,

    /// Output file
    #[arg(short = 'o', long = "out", value_name = "OUTPUT")]
    out: PathBuf,

    /// Re-encode audio to AAC except for passthrough formats
    #[arg(short = 'l', long)]
    louis: bool,

    /// Directory for the per-run work directory (defaults to [paths] temp_root)
    #[arg(long, value_name = "DIR")]
    tmp: Option<PathBuf>,

    /// Languages always kept, comma-separated (e.g. fr,en)
    #[arg(long = "language-keep", value_delimiter = ',', value_name = "LANGS")]
    language_keep: Option<Vec<String>>,

    /// Languages kept when the stream budget allows
    #[arg(long = "try-keep", value_delimiter = ',', value_name = "LANGS")]
    try_keep: Option<Vec<String>>,

    /// Drop subtitles whose language is not in --language-keep
    #[arg(long = "remove-sub-language-not-keep")]
    remove_sub_language_not_keep: bool,

    /// Maximum number of audio and subtitle streams in the output
    #[arg(long, value_name = "COUNT")]
    max_streams: Option<usize>,

    /// Settings file, created with defaults if missing
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the planned commands without extracting or writing anything
    #[arg(long)]
    dry_run: bool,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => {
            let mut manager = ConfigManager::new(path);
            manager
                .load_or_create()
                .with_context(|| format!("loading {}", path.display()))?;
            Ok(manager.settings().clone())
        }
        None => Ok(Settings::default()),
    }
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    let merge = &mut settings.merge;
    if cli.louis {
        merge.louis = true;
    }
    if let Some(ref langs) = cli.language_keep {
        merge.always_keep_languages = langs.clone();
    }
    if let Some(ref langs) = cli.try_keep {
        merge.try_keep_languages = langs.clone();
    }
    if cli.remove_sub_language_not_keep {
        merge.remove_subtitles_outside_keep = true;
    }
    if let Some(max) = cli.max_streams {
        merge.max_streams = max;
    }
    if let Some(ref tmp) = cli.tmp {
        settings.paths.temp_root = tmp.to_string_lossy().into_owned();
    }
    match cli.verbose {
        0 => {}
        1 => settings.logging.level = LogLevel::Debug,
        _ => settings.logging.level = LogLevel::Trace,
    }
}

fn job_name(output: &Path) -> String {
    output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mkv-insert".to_string())
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = load_settings(cli.config.as_deref())?;
    apply_overrides(&mut settings, &cli);

    let logs_dir = PathBuf::from(&settings.paths.logs_folder);
    fs::create_dir_all(&logs_dir)
        .with_context(|| format!("creating {}", logs_dir.display()))?;
    let _guard = init_tracing(settings.logging.level, Some(&logs_dir));

    let rules = settings.validate().context("invalid configuration")?;

    let name = job_name(&cli.out);
    let work_dir = PathBuf::from(&settings.paths.temp_root).join(format!(
        "mkv_insert_{}",
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    ));
    let logger = JobLogger::new(
        name.clone(),
        &logs_dir,
        LogConfig::from_settings(&settings.logging),
        None,
    )
    .context("opening job log")?;

    let pools = WorkerPools::new(settings.merge.resolved_workers())
        .context("starting worker pools")?;
    let runner = Arc::new(ProcessRunner::new(settings.tools.clone()));
    let inputs = MergeInputs {
        source: cli.source,
        enriched: cli.file,
        output: cli.out,
    };

    tracing::info!(
        "Merging {} into {}",
        inputs.source.display(),
        inputs.output.display()
    );

    let ctx = Context::new(
        settings,
        rules,
        name.clone(),
        inputs,
        work_dir,
        Arc::new(logger),
        runner,
        Arc::new(WaveformCorrelator::new()),
    );
    let mut session = MergeSession::new(name, pools);

    let pipeline = if cli.dry_run {
        create_dry_run_pipeline()
    } else {
        create_standard_pipeline()
    };
    let result = pipeline.run_in_work_dir(&ctx, &mut session);
    ctx.logger.close();
    let result = result?;

    if cli.dry_run {
        if let Some(ref plan) = session.plan {
            for command in plan.commands() {
                println!("{}", command.invocation.display());
            }
        }
    }

    let summary = &session.summary;
    tracing::info!(
        "{} step(s) run, {} of {} streams kept ({} identical, {} fidelity, {} subtitle budget, {} converted duplicates)",
        result.total_steps(),
        summary.kept.saturating_sub(summary.converted_duplicates),
        summary.probed,
        summary.fingerprint_duplicates,
        summary.fidelity_duplicates,
        summary.budget_dropped,
        summary.converted_duplicates
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn parses_host_command_line() {
        let cli = parse(&[
            "mkv-insert", "-o", "/out.mkv", "-s", "/src.mkv", "-f", "/enr.mkv", "-l",
        ]);
        assert!(cli.louis);
        assert_eq!(cli.file, PathBuf::from("/enr.mkv"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn overrides_replace_settings() {
        let cli = parse(&[
            "mkv-insert",
            "-o", "o.mkv", "-s", "s.mkv", "-f", "f.mkv",
            "--language-keep", "fr,en",
            "--try-keep", "ja",
            "--max-streams", "12",
            "--remove-sub-language-not-keep",
            "--tmp", "/scratch",
            "-vv",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &cli);

        assert_eq!(settings.merge.always_keep_languages, vec!["fr", "en"]);
        assert_eq!(settings.merge.try_keep_languages, vec!["ja"]);
        assert_eq!(settings.merge.max_streams, 12);
        assert!(settings.merge.remove_subtitles_outside_keep);
        assert_eq!(settings.paths.temp_root, "/scratch");
        assert_eq!(settings.logging.level, LogLevel::Trace);
        assert!(!settings.merge.louis);
    }

    #[test]
    fn missing_required_argument_is_an_error() {
        assert!(Cli::try_parse_from(["mkv-insert", "-o", "o.mkv"]).is_err());
    }

    #[test]
    fn job_name_is_output_stem() {
        assert_eq!(job_name(Path::new("/x/Movie (2001).mkv")), "Movie (2001)");
    }
}
