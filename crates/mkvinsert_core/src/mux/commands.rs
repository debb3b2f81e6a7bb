//! Invocation builders for extraction, conversion, the intermediate
//! multiplex and the verification pass.

use std::path::Path;

use crate::models::{AudioProps, Invocation, StreamDetail, SubtitleProps, Tool, TrackKind};
use crate::probe::AUDIO_PASSTHROUGH_FORMATS;

/// ffmpeg flags that turn any bitstream damage into a hard failure.
const STRICT_DECODE: [&str; 8] = [
    "-err_detect",
    "crccheck",
    "-err_detect",
    "bitstream",
    "-err_detect",
    "buffer",
    "-err_detect",
    "explode",
];

/// Per-channel bitrate under which a re-encode keeps the source bitrate.
const LOUIS_PER_CHANNEL_CEILING: f64 = 128_000.0;

/// Conversion policy shared by every fragment of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// ffmpeg `-threads` value.
    pub threads: usize,
    /// Cut every fragment to this length (the source duration).
    pub duration_secs: Option<f64>,
    /// Re-encode audio outside the passthrough formats to AAC.
    pub louis: bool,
    /// Re-encode lossless audio to FLAC.
    pub flac_lossless: bool,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Isolate one track of `input` into its own container.
pub fn extract_invocation(input: &Path, kind: TrackKind, track_id: u32, output: &Path) -> Invocation {
    let (drop_other, select) = if kind.is_audio() {
        ("-S", "--audio-tracks")
    } else {
        ("-A", "--subtitle-tracks")
    };
    Invocation::new(Tool::Mkvmerge)
        .arg("-o")
        .arg(path_arg(output))
        .args(["-D", drop_other, "--no-global-tags", "-M", "-B", "--no-chapters"])
        .arg(select)
        .arg(track_id.to_string())
        .arg(path_arg(input))
}

/// Codec arguments for one audio fragment; empty means stream copy.
pub fn audio_codec_args(audio: &AudioProps, options: &ConvertOptions) -> Vec<String> {
    let mut args = Vec::new();
    if options.louis {
        if AUDIO_PASSTHROUGH_FORMATS.contains(&audio.format.as_str()) {
            return args;
        }
        args.extend(["-c:a".to_string(), "libfdk_aac".to_string()]);
        if let Some(per_channel) = audio.bitrate_per_channel() {
            let target = if per_channel < LOUIS_PER_CHANNEL_CEILING {
                audio.bitrate.map(|b| b.to_string()).unwrap_or_default()
            } else if audio.channels > 2 {
                "640k".to_string()
            } else {
                "256k".to_string()
            };
            args.extend(["-b:a".to_string(), target]);
        }
        if audio.channels > 0 {
            args.extend(["-ac".to_string(), audio.channels.to_string()]);
        }
    } else if options.flac_lossless && audio.compression == crate::models::CompressionMode::Lossless {
        let sample_fmt = if audio.bit_depth == Some(16) { "s16" } else { "s32" };
        args.extend(
            [
                "-c:a",
                "flac",
                "-compression_level",
                "12",
                "-sample_fmt",
                sample_fmt,
                "-exact_rice_parameters",
                "1",
                "-multi_dim_quant",
                "1",
            ]
            .map(String::from),
        );
    }
    args
}

/// Codec arguments for one subtitle fragment; empty means stream copy.
pub fn subtitle_codec_args(subtitle: &SubtitleProps) -> Vec<String> {
    let target = match subtitle.codec_name.trim().to_ascii_lowercase().as_str() {
        "subrip" | "srt" | "mov_text" | "webvtt" | "text" | "utf-8" | "utf8" => Some("srt"),
        "ass" | "ssa" | "substation alpha" => Some("ass"),
        "dvb_subtitle" | "xsub" => Some("dvd_subtitle"),
        _ => None,
    };
    match target {
        Some(codec) => vec!["-c:s".to_string(), codec.to_string()],
        None => Vec::new(),
    }
}

/// Normalize one extracted fragment.
pub fn convert_invocation(
    detail: &StreamDetail,
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> Invocation {
    let codec_args = match detail {
        StreamDetail::Audio(audio) => audio_codec_args(audio, options),
        StreamDetail::Subtitle(subtitle) => subtitle_codec_args(subtitle),
    };

    let mut invocation = Invocation::new(Tool::Ffmpeg)
        .args(STRICT_DECODE)
        .args(["-fflags", "+genpts+igndts", "-threads"])
        .arg(options.threads.max(1).to_string())
        .args(["-vn", "-i"])
        .arg(path_arg(input))
        .args([
            "-map",
            "0:a?",
            "-map",
            "0:s?",
            "-map_metadata",
            "0",
            "-copy_unknown",
            "-movflags",
            "use_metadata_tags",
            "-c",
            "copy",
        ])
        .args(codec_args);
    if let Some(duration) = options.duration_secs {
        invocation = invocation.arg("-t").arg(format!("{:.3}", duration));
    }
    invocation.arg(path_arg(output))
}

/// Assemble converted fragments, in order, into one file.
pub fn intermediate_invocation<'a>(
    output: &Path,
    fragments: impl IntoIterator<Item = &'a Path>,
) -> Invocation {
    let mut invocation = Invocation::new(Tool::Mkvmerge).arg("-o").arg(path_arg(output));
    for fragment in fragments {
        invocation = invocation
            .args(["--no-global-tags", "-M", "-B"])
            .arg(path_arg(fragment));
    }
    invocation
}

/// Decode-and-discard pass over the intermediate file.
pub fn verify_invocation(input: &Path, threads: usize) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(STRICT_DECODE)
        .arg("-threads")
        .arg(threads.max(1).to_string())
        .arg("-i")
        .arg(path_arg(input))
        .args(["-map", "0", "-f", "null", "-c", "copy", "-"])
}

/// Render tokens one option per line, continuation-backslash style.
pub fn format_tokens_pretty(tokens: &[String]) -> String {
    let mut result = String::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        if token.starts_with('-') && i + 1 < tokens.len() && !tokens[i + 1].starts_with('-') {
            result.push_str(&format!("{} {} \\\n", token, tokens[i + 1]));
            i += 2;
        } else {
            result.push_str(&format!("{} \\\n", token));
            i += 1;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{audio, subtitle};
    use crate::models::CompressionMode;

    fn options(louis: bool) -> ConvertOptions {
        ConvertOptions {
            threads: 4,
            duration_secs: Some(5400.5),
            louis,
            flac_lossless: true,
        }
    }

    fn lossless(format: &str, bit_depth: Option<u32>) -> AudioProps {
        let mut props = audio(1, "en", format, 8, 48000, 4_000_000)
            .as_audio()
            .cloned()
            .unwrap();
        props.compression = CompressionMode::Lossless;
        props.bit_depth = bit_depth;
        props
    }

    #[test]
    fn extract_selects_one_track() {
        let inv = extract_invocation(
            Path::new("/in/source.mkv"),
            TrackKind::Commentary,
            3,
            Path::new("/w/x.mkv"),
        );
        assert_eq!(
            inv.args,
            vec![
                "-o", "/w/x.mkv", "-D", "-S", "--no-global-tags", "-M", "-B", "--no-chapters",
                "--audio-tracks", "3", "/in/source.mkv"
            ]
        );

        let inv = extract_invocation(Path::new("a.mkv"), TrackKind::Subtitle, 5, Path::new("b.mkv"));
        assert!(inv.args.contains(&"-A".to_string()));
        assert!(inv.args.contains(&"--subtitle-tracks".to_string()));
    }

    #[test]
    fn lossless_audio_goes_to_flac() {
        let args = audio_codec_args(&lossless("truehd", Some(24)), &options(false));
        assert_eq!(&args[..2], &["-c:a", "flac"]);
        assert!(args.windows(2).any(|w| w == ["-sample_fmt", "s32"]));

        let args = audio_codec_args(&lossless("pcm", Some(16)), &options(false));
        assert!(args.windows(2).any(|w| w == ["-sample_fmt", "s16"]));

        let mut no_flac = options(false);
        no_flac.flac_lossless = false;
        assert!(audio_codec_args(&lossless("flac", None), &no_flac).is_empty());
    }

    #[test]
    fn louis_mode_bitrate_rules() {
        let passthrough = audio(1, "en", "eac3", 6, 48000, 640_000);
        assert!(audio_codec_args(passthrough.as_audio().unwrap(), &options(true)).is_empty());

        let dts = audio(2, "en", "dts", 6, 48000, 1_536_000);
        let args = audio_codec_args(dts.as_audio().unwrap(), &options(true));
        assert_eq!(args, vec!["-c:a", "libfdk_aac", "-b:a", "640k", "-ac", "6"]);

        let stereo = audio(3, "en", "flac", 2, 48000, 900_000);
        let args = audio_codec_args(stereo.as_audio().unwrap(), &options(true));
        assert_eq!(args, vec!["-c:a", "libfdk_aac", "-b:a", "256k", "-ac", "2"]);

        let thin = audio(4, "en", "vorbis", 2, 48000, 160_000);
        let args = audio_codec_args(thin.as_audio().unwrap(), &options(true));
        assert_eq!(args, vec!["-c:a", "libfdk_aac", "-b:a", "160000", "-ac", "2"]);
    }

    #[test]
    fn subtitle_targets() {
        let codec = |name: &str| subtitle_codec_args(subtitle(1, "en", name, "").as_subtitle().unwrap());
        assert_eq!(codec("subrip"), vec!["-c:s", "srt"]);
        assert_eq!(codec("webvtt"), vec!["-c:s", "srt"]);
        assert_eq!(codec("ssa"), vec!["-c:s", "ass"]);
        assert_eq!(codec("dvb_subtitle"), vec!["-c:s", "dvd_subtitle"]);
        assert!(codec("hdmv_pgs_subtitle").is_empty());
        assert!(codec("arib_caption").is_empty());
    }

    #[test]
    fn convert_has_strict_decode_and_duration() {
        let record = subtitle(1, "en", "subrip", "");
        let inv = convert_invocation(
            &record.detail,
            Path::new("in.mkv"),
            Path::new("out.mkv"),
            &options(false),
        );
        assert_eq!(inv.tool, Tool::Ffmpeg);
        assert_eq!(&inv.args[..8], &STRICT_DECODE);
        assert!(inv.args.windows(2).any(|w| w == ["-threads", "4"]));
        assert!(inv.args.windows(2).any(|w| w == ["-t", "5400.500"]));
        assert!(inv.args.windows(2).any(|w| w == ["-c:s", "srt"]));
        assert_eq!(inv.args.last().map(String::as_str), Some("out.mkv"));
    }

    #[test]
    fn intermediate_and_verify() {
        let a = Path::new("a.mkv");
        let b = Path::new("b.mkv");
        let inv = intermediate_invocation(Path::new("split.mkv"), [a, b]);
        assert_eq!(
            inv.args,
            vec![
                "-o", "split.mkv", "--no-global-tags", "-M", "-B", "a.mkv", "--no-global-tags",
                "-M", "-B", "b.mkv"
            ]
        );

        let inv = verify_invocation(Path::new("split.mkv"), 0);
        assert!(inv.args.windows(2).any(|w| w == ["-threads", "1"]));
        assert_eq!(inv.args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn pretty_pairs_options_with_values() {
        let tokens: Vec<String> = ["-o", "out.mkv", "-D", "-A", "in.mkv"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            format_tokens_pretty(&tokens),
            "-o out.mkv \\\n-D \\\n-A in.mkv \\\n"
        );
    }
}
