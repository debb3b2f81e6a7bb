//! Track flags, exclusions and ordering for the final multiplex.

use std::collections::BTreeMap;
use std::path::Path;

use super::fragments::Fragment;
use crate::models::{Invocation, StreamRecord, SubtitleCategory, Tool, TrackKind};

/// One-shot "default audio assigned" flag owned by a merge session.
///
/// The first claim fixes the default track. Later claims succeed only for
/// that same track, so re-emitting flags never marks a second default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultAudioSlot {
    assigned: Option<u32>,
}

impl DefaultAudioSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot for intermediate track `id`.
    pub fn claim(&mut self, id: u32) -> bool {
        match self.assigned {
            Some(current) => current == id,
            None => {
                self.assigned = Some(id);
                true
            }
        }
    }

    /// Track holding the slot, if any.
    pub fn assigned(&self) -> Option<u32> {
        self.assigned
    }
}

/// Language policy applied while flagging audio.
#[derive(Debug, Clone, Copy)]
pub struct LanguageFlags<'a> {
    /// Production language of the source, if known.
    pub original_language: Option<&'a str>,
    /// Retag "und" audio with `undetermined_language`.
    pub change_all_und: bool,
    pub undetermined_language: &'a str,
}

impl LanguageFlags<'_> {
    /// Language the track ends up tagged with, and whether it was remapped.
    fn effective<'r>(&'r self, record: &'r StreamRecord) -> (&'r str, bool) {
        if record.language == "und" && self.change_all_und && record.kind().is_audio() {
            (self.undetermined_language, true)
        } else {
            (record.language.as_str(), false)
        }
    }

    fn is_original(&self, language: &str) -> bool {
        self.original_language == Some(language)
    }
}

/// Everything the final multiplex needs besides file paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalFlags {
    pub audio: Vec<String>,
    pub subtitles: Vec<String>,
    /// Intermediate ids dropped after the intermediate multiplex.
    pub excluded_audio: Vec<u32>,
    pub excluded_subtitles: Vec<u32>,
    /// `--track-order` entries, enriched video first.
    pub track_order: Vec<String>,
}

fn track_key(record: &StreamRecord, language: &str) -> String {
    match record.kind() {
        TrackKind::Audio => language.to_string(),
        TrackKind::Commentary => format!("{}_com", language),
        TrackKind::AudioDescription => format!("{}_visuali", language),
        TrackKind::Subtitle => match record.as_subtitle() {
            Some(sub) => format!(
                "{}{}{}",
                language,
                sub.codec_class.order_key(),
                sub.category().order_suffix()
            ),
            None => language.to_string(),
        },
    }
}

/// Surviving fragments in final track order.
///
/// Audio keys sort before subtitle keys; ties keep intermediate order.
fn ordered<'f>(
    records: &[StreamRecord],
    fragments: &'f [Fragment],
    languages: &LanguageFlags<'_>,
) -> Vec<&'f Fragment> {
    let mut audio: BTreeMap<String, Vec<&Fragment>> = BTreeMap::new();
    let mut subtitles: BTreeMap<String, Vec<&Fragment>> = BTreeMap::new();
    for fragment in fragments {
        let record = &records[fragment.record];
        if !record.keep() {
            continue;
        }
        let (language, _) = languages.effective(record);
        let key = track_key(record, language);
        let bucket = if fragment.kind.is_audio() {
            &mut audio
        } else {
            &mut subtitles
        };
        bucket.entry(key).or_default().push(fragment);
    }
    audio
        .into_values()
        .chain(subtitles.into_values())
        .flatten()
        .collect()
}

/// Track chosen as default audio: first original-language main audio in
/// track order, else the first main audio, else the first audio track.
fn default_audio(
    records: &[StreamRecord],
    order: &[&Fragment],
    languages: &LanguageFlags<'_>,
) -> Option<u32> {
    let main = || {
        order
            .iter()
            .filter(|f| f.kind == TrackKind::Audio)
    };
    main()
        .find(|f| languages.is_original(languages.effective(&records[f.record]).0))
        .or_else(|| main().next())
        .or_else(|| order.iter().find(|f| f.kind.is_audio()))
        .map(|f| f.intermediate_id)
}

/// Build flags, exclusions and order for the surviving fragments.
///
/// `slot` is claimed for the default audio track; when the session already
/// assigned a different one, no track is marked default here.
pub fn final_flags(
    records: &[StreamRecord],
    fragments: &[Fragment],
    languages: &LanguageFlags<'_>,
    slot: &mut DefaultAudioSlot,
) -> FinalFlags {
    let order = ordered(records, fragments, languages);
    let default_id = default_audio(records, &order, languages);
    let mut flags = FinalFlags::default();

    for fragment in fragments {
        let record = &records[fragment.record];
        let id = fragment.intermediate_id;
        if !record.keep() {
            if fragment.kind.is_audio() {
                flags.excluded_audio.push(id);
            } else {
                flags.excluded_subtitles.push(id);
            }
            continue;
        }

        if fragment.kind.is_audio() {
            let (language, remapped) = languages.effective(record);
            if remapped {
                flags.audio.push("--language".to_string());
                flags.audio.push(format!("{}:{}", id, language));
            }
            if languages.is_original(language) {
                flags.audio.push("--original-flag".to_string());
                flags.audio.push(id.to_string());
            }
            let is_default = default_id == Some(id) && slot.claim(id);
            let flag = if is_default { 1 } else { 0 };
            flags.audio.extend([
                "--forced-display-flag".to_string(),
                format!("{}:0", id),
                "--default-track-flag".to_string(),
                format!("{}:{}", id, flag),
            ]);
            match fragment.kind {
                TrackKind::Commentary => {
                    flags.audio.push("--commentary-flag".to_string());
                    flags.audio.push(id.to_string());
                }
                TrackKind::AudioDescription => {
                    flags.audio.push("--visual-impaired-flag".to_string());
                    flags.audio.push(id.to_string());
                }
                _ => {}
            }
        } else if let Some(sub) = record.as_subtitle() {
            flags.subtitles.push("--default-track-flag".to_string());
            flags.subtitles.push(format!("{}:0", id));
            match sub.category() {
                SubtitleCategory::Forced => {
                    flags.subtitles.push("--forced-display-flag".to_string());
                    flags.subtitles.push(format!("{}:1", id));
                }
                SubtitleCategory::HearingImpaired => {
                    flags.subtitles.push("--hearing-impaired-flag".to_string());
                    flags.subtitles.push(format!("{}:1", id));
                }
                SubtitleCategory::Dubtitle => {
                    // mkvmerge has no dubtitle flag. Clear an original flag the
                    // track may carry over from its source file.
                    flags.subtitles.push("--original-flag".to_string());
                    flags.subtitles.push(format!("{}:0", id));
                }
                SubtitleCategory::Plain => {}
            }
        }
    }

    flags.track_order.push("0:0".to_string());
    flags
        .track_order
        .extend(order.iter().map(|f| format!("1:{}", f.intermediate_id)));
    flags
}

fn exclusion(ids: &[u32]) -> String {
    let list: Vec<String> = ids.iter().map(u32::to_string).collect();
    format!("!{}", list.join(","))
}

/// Input files of the final multiplex.
#[derive(Debug, Clone, Copy)]
pub struct FinalInputs<'a> {
    pub output: &'a Path,
    /// Supplies the video.
    pub enriched: &'a Path,
    /// Supplies chapters and global metadata.
    pub source: &'a Path,
    /// `None` when no audio or subtitle track survived.
    pub intermediate: Option<&'a Path>,
}

/// Final `mkvmerge` invocation: enriched video, intermediate tracks,
/// source chapters.
pub fn final_invocation(inputs: &FinalInputs<'_>, flags: &FinalFlags) -> Invocation {
    let mut invocation = Invocation::new(Tool::Mkvmerge)
        .arg("-o")
        .arg(inputs.output.to_string_lossy())
        .args(["-A", "-S", "--no-chapters", "-M", "-B", "--no-global-tags"])
        .arg(inputs.enriched.to_string_lossy());

    if let Some(intermediate) = inputs.intermediate {
        invocation = invocation.args(flags.audio.iter().cloned());
        if !flags.excluded_audio.is_empty() {
            invocation = invocation.arg("-a").arg(exclusion(&flags.excluded_audio));
        }
        invocation = invocation.args(flags.subtitles.iter().cloned());
        if !flags.excluded_subtitles.is_empty() {
            invocation = invocation.arg("-s").arg(exclusion(&flags.excluded_subtitles));
        }
        invocation = invocation.arg("-D").arg(intermediate.to_string_lossy());
    }

    invocation
        .args(["-A", "-S", "-D"])
        .arg(inputs.source.to_string_lossy())
        .arg("--track-order")
        .arg(flags.track_order.join(","))
}
