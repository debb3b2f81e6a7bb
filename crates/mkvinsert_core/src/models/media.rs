//! Stream records probed from the two input files.

use serde::Serialize;

use super::enums::{
    AudioRole, CompressionMode, SourceSlot, SubtitleCategory, SubtitleCodecClass, TrackKind,
};

/// Audio-specific stream properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioProps {
    /// Normalized format name as used by the rule graph (e.g. "eac3", "dts-hd ma").
    pub format: String,
    /// Raw codec name reported by the prober.
    pub codec_name: String,
    pub channels: u32,
    pub sampling_rate: u32,
    /// Bits per second, when the container reports it.
    pub bitrate: Option<u64>,
    pub bit_depth: Option<u32>,
    pub compression: CompressionMode,
    pub role: AudioRole,
}

impl AudioProps {
    /// Per-channel bitrate, when the bitrate is known.
    pub fn bitrate_per_channel(&self) -> Option<f64> {
        match (self.bitrate, self.channels) {
            (Some(bitrate), channels) if channels > 0 => Some(bitrate as f64 / channels as f64),
            _ => None,
        }
    }
}

/// Subtitle-specific stream properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleProps {
    pub codec_name: String,
    pub codec_class: SubtitleCodecClass,
    pub is_forced: bool,
    pub is_hearing_impaired: bool,
    pub is_dubtitle: bool,
}

impl SubtitleProps {
    /// Category with forced taking precedence over hearing-impaired over dubtitle.
    pub fn category(&self) -> SubtitleCategory {
        if self.is_forced {
            SubtitleCategory::Forced
        } else if self.is_hearing_impaired {
            SubtitleCategory::HearingImpaired
        } else if self.is_dubtitle {
            SubtitleCategory::Dubtitle
        } else {
            SubtitleCategory::Plain
        }
    }
}

/// Kind-specific payload of a stream record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamDetail {
    Audio(AudioProps),
    Subtitle(SubtitleProps),
}

/// One elementary audio or subtitle track of an input file.
///
/// The keep flag starts set and can only be cleared through [`StreamRecord::discard`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRecord {
    pub slot: SourceSlot,
    /// Track index inside its own file (mkvmerge track id).
    pub stream_order: u32,
    /// ISO language code, "und" when unknown.
    pub language: String,
    /// Content fingerprint; empty when unknown.
    pub content_hash: String,
    pub title: String,
    pub duration_secs: Option<f64>,
    pub detail: StreamDetail,
    keep: bool,
    drop_reason: Option<String>,
}

impl StreamRecord {
    /// Create an audio record.
    pub fn audio(
        slot: SourceSlot,
        stream_order: u32,
        language: impl Into<String>,
        props: AudioProps,
    ) -> Self {
        Self::new(slot, stream_order, language.into(), StreamDetail::Audio(props))
    }

    /// Create a subtitle record.
    pub fn subtitle(
        slot: SourceSlot,
        stream_order: u32,
        language: impl Into<String>,
        props: SubtitleProps,
    ) -> Self {
        Self::new(slot, stream_order, language.into(), StreamDetail::Subtitle(props))
    }

    fn new(slot: SourceSlot, stream_order: u32, language: String, detail: StreamDetail) -> Self {
        Self {
            slot,
            stream_order,
            language,
            content_hash: String::new(),
            title: String::new(),
            duration_secs: None,
            detail,
            keep: true,
            drop_reason: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = hash.into();
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Whether the track is still part of the output.
    pub fn keep(&self) -> bool {
        self.keep
    }

    /// Why the track was dropped, if it was.
    pub fn drop_reason(&self) -> Option<&str> {
        self.drop_reason.as_deref()
    }

    /// Clear the keep flag. Returns false when the track was already dropped;
    /// the first reason is retained.
    pub fn discard(&mut self, reason: impl Into<String>) -> bool {
        if !self.keep {
            return false;
        }
        self.keep = false;
        self.drop_reason = Some(reason.into());
        true
    }

    /// Group kind this record belongs to.
    pub fn kind(&self) -> TrackKind {
        match &self.detail {
            StreamDetail::Audio(a) => a.role.kind(),
            StreamDetail::Subtitle(_) => TrackKind::Subtitle,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioProps> {
        match &self.detail {
            StreamDetail::Audio(a) => Some(a),
            StreamDetail::Subtitle(_) => None,
        }
    }

    pub fn as_subtitle(&self) -> Option<&SubtitleProps> {
        match &self.detail {
            StreamDetail::Subtitle(s) => Some(s),
            StreamDetail::Audio(_) => None,
        }
    }

    /// Short human-readable identifier for logs.
    pub fn label(&self) -> String {
        let codec = match &self.detail {
            StreamDetail::Audio(a) => a.format.as_str(),
            StreamDetail::Subtitle(s) => s.codec_name.as_str(),
        };
        format!(
            "{}#{} [{} {} {}]",
            self.slot,
            self.stream_order,
            self.kind(),
            self.language,
            codec
        )
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn audio(order: u32, lang: &str, format: &str, channels: u32, rate: u32, bitrate: u64) -> StreamRecord {
        StreamRecord::audio(
            SourceSlot::Source,
            order,
            lang,
            AudioProps {
                format: format.to_string(),
                codec_name: format.to_string(),
                channels,
                sampling_rate: rate,
                bitrate: Some(bitrate),
                bit_depth: None,
                compression: CompressionMode::Lossy,
                role: AudioRole::Main,
            },
        )
        .with_duration(1800.0)
    }

    pub fn subtitle(order: u32, lang: &str, codec: &str, title: &str) -> StreamRecord {
        StreamRecord::subtitle(
            SourceSlot::Source,
            order,
            lang,
            SubtitleProps {
                codec_name: codec.to_string(),
                codec_class: SubtitleCodecClass::from_codec(codec),
                is_forced: false,
                is_hearing_impaired: false,
                is_dubtitle: false,
            },
        )
        .with_title(title)
    }

    pub fn forced_subtitle(order: u32, lang: &str, codec: &str, title: &str) -> StreamRecord {
        let mut record = subtitle(order, lang, codec, title);
        if let StreamDetail::Subtitle(ref mut s) = record.detail {
            s.is_forced = true;
        }
        record
    }

    pub fn hi_subtitle(order: u32, lang: &str, codec: &str, title: &str) -> StreamRecord {
        let mut record = subtitle(order, lang, codec, title);
        if let StreamDetail::Subtitle(ref mut s) = record.detail {
            s.is_hearing_impaired = true;
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn discard_is_one_way() {
        let mut record = audio(1, "eng", "ac3", 6, 48000, 448_000);
        assert!(record.keep());
        assert!(record.discard("duplicate"));
        assert!(!record.discard("other reason"));
        assert!(!record.keep());
        assert_eq!(record.drop_reason(), Some("duplicate"));
    }

    #[test]
    fn subtitle_category_precedence() {
        let props = SubtitleProps {
            codec_name: "subrip".into(),
            codec_class: SubtitleCodecClass::Text,
            is_forced: true,
            is_hearing_impaired: true,
            is_dubtitle: false,
        };
        assert_eq!(props.category(), SubtitleCategory::Forced);
    }

    #[test]
    fn per_channel_bitrate() {
        let record = audio(1, "eng", "ac3", 6, 48000, 384_000);
        let props = record.as_audio().unwrap();
        assert_eq!(props.bitrate_per_channel(), Some(64_000.0));
    }

    #[test]
    fn label_names_slot_and_codec() {
        let record = subtitle(3, "fre", "subrip", "Français");
        assert_eq!(record.label(), "source#3 [subtitle fre subrip]");
    }
}
