//! Per-stream parsing of ffprobe JSON.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{
    AudioProps, AudioRole, CompressionMode, SourceSlot, StreamRecord, SubtitleCodecClass,
    SubtitleProps,
};

/// Formats kept as-is in louis mode.
pub const AUDIO_PASSTHROUGH_FORMATS: [&str; 7] =
    ["aac", "ac3", "eac3", "mp3", "opus", "he-aac", "he-aacv2"];

static FORCED_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)forced").expect("valid regex"));

/// `cc` and `hi` are ordinary words, so they only count bracketed or at the
/// end of the title.
static HEARING_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bsdh\b|[\[(](cc|hi)[\])]|\b(cc|hi)\s*$|hearing|malentendant")
        .expect("valid regex")
});

static DUBTITLE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)dubtitle").expect("valid regex"));

static COMMENTARY_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)comment").expect("valid regex"));

static DESCRIPTION_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)audio ?desc|\bad\b|visual|descriptive").expect("valid regex")
});

/// ISO 639-2 (bibliographic and terminologic) codes with a 639-1 form.
const TWO_LETTER_CODES: &[(&str, &str)] = &[
    ("ara", "ar"),
    ("ces", "cs"),
    ("chi", "zh"),
    ("cze", "cs"),
    ("dan", "da"),
    ("deu", "de"),
    ("dut", "nl"),
    ("ell", "el"),
    ("eng", "en"),
    ("fin", "fi"),
    ("fra", "fr"),
    ("fre", "fr"),
    ("ger", "de"),
    ("gre", "el"),
    ("heb", "he"),
    ("hin", "hi"),
    ("hun", "hu"),
    ("ind", "id"),
    ("ita", "it"),
    ("jpn", "ja"),
    ("kor", "ko"),
    ("nld", "nl"),
    ("nor", "no"),
    ("pol", "pl"),
    ("por", "pt"),
    ("ron", "ro"),
    ("rum", "ro"),
    ("rus", "ru"),
    ("spa", "es"),
    ("swe", "sv"),
    ("tha", "th"),
    ("tur", "tr"),
    ("ukr", "uk"),
    ("vie", "vi"),
    ("zho", "zh"),
];

/// Lower-case, drop any region suffix, prefer the two-letter code and map
/// empty to "und".
///
/// Both files and the keep lists go through here, so `fre`, `fra` and
/// `fr-FR` all land in the same language group.
pub fn normalize_language(raw: &str) -> String {
    let base = raw.trim().split(['-', '_']).next().unwrap_or("").to_lowercase();
    if base.is_empty() {
        return "und".to_string();
    }
    match TWO_LETTER_CODES.binary_search_by(|(long, _)| long.cmp(&base.as_str())) {
        Ok(pos) => TWO_LETTER_CODES[pos].1.to_string(),
        Err(_) => base,
    }
}

/// Map an ffprobe codec name and profile to a rule-graph format name.
pub fn normalize_audio_format(codec_name: &str, profile: Option<&str>) -> (String, CompressionMode) {
    let codec = codec_name.trim().to_lowercase();
    let profile = profile.unwrap_or("").to_lowercase();

    match codec.as_str() {
        "dts" if profile.contains("ma") => ("dts-hd ma".to_string(), CompressionMode::Lossless),
        "truehd" | "mlp" => ("truehd".to_string(), CompressionMode::Lossless),
        "flac" | "alac" | "wavpack" | "ape" => (codec, CompressionMode::Lossless),
        c if c.starts_with("pcm_") => ("pcm".to_string(), CompressionMode::Lossless),
        "aac" if profile.contains("he-aacv2") => ("he-aacv2".to_string(), CompressionMode::Lossy),
        "aac" if profile.contains("he-aac") => ("he-aac".to_string(), CompressionMode::Lossy),
        _ => (codec, CompressionMode::Lossy),
    }
}

pub(super) fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|n: &f64| n.is_finite())
}

fn tag<'a>(stream: &'a Value, key: &str) -> Option<&'a str> {
    let tags = stream.get("tags")?.as_object()?;
    tags.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, v)| v.as_str())
}

fn disposition(stream: &Value, key: &str) -> bool {
    stream
        .get("disposition")
        .and_then(|d| d.get(key))
        .and_then(|v| v.as_i64())
        .map(|v| v != 0)
        .unwrap_or(false)
}

pub(super) fn is_attached_picture(stream: &Value) -> bool {
    disposition(stream, "attached_pic")
}

pub(super) fn language(stream: &Value) -> String {
    normalize_language(tag(stream, "language").unwrap_or(""))
}

fn title(stream: &Value) -> String {
    tag(stream, "title").unwrap_or("").trim().to_string()
}

/// Matroska `DURATION` tag, `HH:MM:SS.nnnnnnnnn`.
fn parse_duration_tag(raw: &str) -> Option<f64> {
    let mut parts = raw.trim().split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn duration(stream: &Value) -> Option<f64> {
    stream
        .get("duration")
        .and_then(number)
        .or_else(|| tag(stream, "DURATION").and_then(parse_duration_tag))
        .filter(|d| *d > 0.0)
}

fn bitrate(stream: &Value) -> Option<u64> {
    stream
        .get("bit_rate")
        .and_then(number)
        .or_else(|| {
            tag(stream, "BPS")
                .or_else(|| tag(stream, "BPS-eng"))
                .and_then(|s| s.trim().parse().ok())
        })
        .filter(|b| *b > 0.0)
        .map(|b| b as u64)
}

fn index(stream: &Value) -> Option<u32> {
    stream.get("index")?.as_u64().map(|i| i as u32)
}

/// Build an audio record; `None` when index or codec is missing.
pub(super) fn parse_audio(stream: &Value, slot: SourceSlot) -> Option<StreamRecord> {
    let order = index(stream)?;
    let codec_name = stream.get("codec_name")?.as_str()?.to_string();
    let profile = stream.get("profile").and_then(|p| p.as_str());
    let (format, compression) = normalize_audio_format(&codec_name, profile);
    let title = title(stream);

    let role = if disposition(stream, "comment") || COMMENTARY_TITLE.is_match(&title) {
        AudioRole::Commentary
    } else if disposition(stream, "visual_impaired") || DESCRIPTION_TITLE.is_match(&title) {
        AudioRole::AudioDescription
    } else {
        AudioRole::Main
    };

    let props = AudioProps {
        format,
        codec_name,
        channels: stream.get("channels").and_then(|c| c.as_u64()).unwrap_or(0) as u32,
        sampling_rate: stream.get("sample_rate").and_then(number).unwrap_or(0.0) as u32,
        bitrate: bitrate(stream),
        bit_depth: stream
            .get("bits_per_raw_sample")
            .and_then(number)
            .filter(|b| *b > 0.0)
            .map(|b| b as u32),
        compression,
        role,
    };

    let mut record = StreamRecord::audio(slot, order, language(stream), props).with_title(title);
    if let Some(secs) = duration(stream) {
        record = record.with_duration(secs);
    }
    Some(record)
}

/// Build a subtitle record; `None` when index or codec is missing.
pub(super) fn parse_subtitle(stream: &Value, slot: SourceSlot) -> Option<StreamRecord> {
    let order = index(stream)?;
    let codec_name = stream.get("codec_name")?.as_str()?.to_string();
    let title = title(stream);

    let props = SubtitleProps {
        codec_class: SubtitleCodecClass::from_codec(&codec_name),
        codec_name,
        is_forced: disposition(stream, "forced") || FORCED_TITLE.is_match(&title),
        is_hearing_impaired: disposition(stream, "hearing_impaired")
            || HEARING_TITLE.is_match(&title),
        is_dubtitle: DUBTITLE_TITLE.is_match(&title),
    };

    let mut record =
        StreamRecord::subtitle(slot, order, language(stream), props).with_title(title);
    if let Some(secs) = duration(stream) {
        record = record.with_duration(secs);
    }
    Some(record)
}
