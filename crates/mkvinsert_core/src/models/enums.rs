//! Core enums used throughout the merge pass.

use serde::{Deserialize, Serialize};

/// Which of the two input files a stream was probed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSlot {
    /// The original source file (also supplies chapters and global metadata).
    Source,
    /// The previously produced variant whose video is kept.
    Enriched,
}

impl std::fmt::Display for SourceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSlot::Source => write!(f, "source"),
            SourceSlot::Enriched => write!(f, "enriched"),
        }
    }
}

/// Kind of track group. Audio roles get their own groups so a commentary
/// never competes with the main audio of the same language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Commentary,
    AudioDescription,
    Subtitle,
}

impl TrackKind {
    /// All kinds, in the order the fragments are laid out in the intermediate file.
    pub const EMISSION_ORDER: [TrackKind; 4] = [
        TrackKind::Subtitle,
        TrackKind::Audio,
        TrackKind::Commentary,
        TrackKind::AudioDescription,
    ];

    /// Whether this kind carries audio.
    pub fn is_audio(&self) -> bool {
        !matches!(self, TrackKind::Subtitle)
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Commentary => write!(f, "commentary"),
            TrackKind::AudioDescription => write!(f, "audio description"),
            TrackKind::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Role of an audio track, derived from disposition and title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioRole {
    #[default]
    Main,
    Commentary,
    AudioDescription,
}

impl AudioRole {
    pub fn kind(&self) -> TrackKind {
        match self {
            AudioRole::Main => TrackKind::Audio,
            AudioRole::Commentary => TrackKind::Commentary,
            AudioRole::AudioDescription => TrackKind::AudioDescription,
        }
    }
}

/// Compression mode of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    #[default]
    Lossy,
    Lossless,
}

/// Subtitle codec family used for clustering and conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleCodecClass {
    /// Plain text codecs that convert losslessly to SRT.
    Text,
    /// Styled or bitmap codecs (ASS/SSA, PGS, VobSub, DVB).
    Graphic,
    /// Codecs ffmpeg cannot re-encode; passed through untouched.
    Uncodable,
}

impl SubtitleCodecClass {
    /// Classify an ffprobe/mkvmerge codec name.
    pub fn from_codec(codec_name: &str) -> Self {
        match codec_name.trim().to_ascii_lowercase().as_str() {
            "subrip" | "srt" | "mov_text" | "webvtt" | "text" | "utf-8" | "utf8" => {
                SubtitleCodecClass::Text
            }
            "ass" | "ssa" | "substation alpha" | "hdmv_pgs_subtitle" | "pgs" | "dvd_subtitle"
            | "vobsub" | "dvb_subtitle" | "xsub" => SubtitleCodecClass::Graphic,
            _ => SubtitleCodecClass::Uncodable,
        }
    }

    /// Suffix used in synthesized track-order keys.
    pub fn order_key(&self) -> &'static str {
        match self {
            SubtitleCodecClass::Text => "srt",
            SubtitleCodecClass::Graphic => "all",
            SubtitleCodecClass::Uncodable => "uncodable",
        }
    }
}

/// Subtitle category from title text and disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleCategory {
    Forced,
    HearingImpaired,
    Dubtitle,
    Plain,
}

impl SubtitleCategory {
    /// Suffix used in synthesized track-order keys.
    pub fn order_suffix(&self) -> &'static str {
        match self {
            SubtitleCategory::Forced => "_forced",
            SubtitleCategory::HearingImpaired => "_hearing",
            SubtitleCategory::Dubtitle => "_dub",
            SubtitleCategory::Plain => "",
        }
    }
}

impl std::fmt::Display for SubtitleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtitleCategory::Forced => write!(f, "forced"),
            SubtitleCategory::HearingImpaired => write!(f, "hearing-impaired"),
            SubtitleCategory::Dubtitle => write!(f, "dubtitle"),
            SubtitleCategory::Plain => write!(f, "plain"),
        }
    }
}

/// Processing stage of one surviving track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum TrackStage {
    #[default]
    Pending,
    Extracted,
    Converted,
    Muxed,
}

impl TrackStage {
    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<TrackStage> {
        match self {
            TrackStage::Pending => Some(TrackStage::Extracted),
            TrackStage::Extracted => Some(TrackStage::Converted),
            TrackStage::Converted => Some(TrackStage::Muxed),
            TrackStage::Muxed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_subtitle_codecs() {
        assert_eq!(SubtitleCodecClass::from_codec("subrip"), SubtitleCodecClass::Text);
        assert_eq!(SubtitleCodecClass::from_codec("WebVTT"), SubtitleCodecClass::Text);
        assert_eq!(SubtitleCodecClass::from_codec("ass"), SubtitleCodecClass::Graphic);
        assert_eq!(
            SubtitleCodecClass::from_codec("hdmv_pgs_subtitle"),
            SubtitleCodecClass::Graphic
        );
        assert_eq!(
            SubtitleCodecClass::from_codec("arib_caption"),
            SubtitleCodecClass::Uncodable
        );
    }

    #[test]
    fn stages_advance_in_order() {
        let mut stage = TrackStage::Pending;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![
                TrackStage::Pending,
                TrackStage::Extracted,
                TrackStage::Converted,
                TrackStage::Muxed
            ]
        );
    }

    #[test]
    fn kind_display() {
        assert_eq!(TrackKind::AudioDescription.to_string(), "audio description");
        assert!(TrackKind::Commentary.is_audio());
        assert!(!TrackKind::Subtitle.is_audio());
    }
}
