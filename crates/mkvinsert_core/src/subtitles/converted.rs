//! Styled subtitles that are re-encodings of a kept text track.
//!
//! Both sides are rendered to SRT by ffmpeg and hashed. A styled track
//! whose rendering matches a kept text track of the same language carries
//! no extra content and is dropped.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::fingerprint::stdout_digest;
use crate::models::{Invocation, StreamRecord, SubtitleCodecClass, Tool};
use crate::runner::ToolRunner;

use super::budget::Removal;

/// Where one subtitle stream can be read from.
#[derive(Debug, Clone, Copy)]
pub struct DigestTarget<'a> {
    /// Index into the record list.
    pub record: usize,
    pub path: &'a Path,
    /// Stream index inside `path`.
    pub stream_order: u32,
}

/// Invocation that renders one subtitle stream as SRT to stdout.
pub fn text_digest_invocation(path: &Path, stream_order: u32) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-v", "error", "-i"])
        .arg(path.to_string_lossy())
        .args(["-map".to_string(), format!("0:{}", stream_order)])
        .args(["-f", "srt", "-"])
}

/// Graphic codecs that still carry text ffmpeg can render as SRT.
pub fn renders_text(codec_name: &str) -> bool {
    matches!(
        codec_name.trim().to_ascii_lowercase().as_str(),
        "ass" | "ssa" | "substation alpha"
    )
}

fn digest(runner: &dyn ToolRunner, records: &[StreamRecord], target: &DigestTarget<'_>) -> Option<String> {
    match stdout_digest(runner, &text_digest_invocation(target.path, target.stream_order)) {
        Ok(d) if !d.is_empty() => Some(d),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(
                "Could not render {} as text: {}",
                records[target.record].label(),
                e
            );
            None
        }
    }
}

/// Styled subtitles whose text equals a kept text subtitle of the same
/// language.
///
/// Only targets that are kept subtitles take part. Languages without both
/// a text and a styled track cost no process runs.
pub fn find_converted_duplicates(
    runner: &dyn ToolRunner,
    records: &[StreamRecord],
    targets: &[DigestTarget<'_>],
) -> Vec<Removal> {
    let mut by_language: BTreeMap<&str, (Vec<&DigestTarget<'_>>, Vec<&DigestTarget<'_>>)> =
        BTreeMap::new();
    for target in targets {
        let record = &records[target.record];
        let Some(sub) = record.as_subtitle() else {
            continue;
        };
        if !record.keep() {
            continue;
        }
        let entry = by_language.entry(record.language.as_str()).or_default();
        match sub.codec_class {
            SubtitleCodecClass::Text => entry.0.push(target),
            SubtitleCodecClass::Graphic if renders_text(&sub.codec_name) => entry.1.push(target),
            _ => {}
        }
    }

    let mut removals = Vec::new();
    for (language, (text, styled)) in by_language {
        if text.is_empty() || styled.is_empty() {
            continue;
        }
        let text_digests: HashSet<String> = text
            .iter()
            .filter_map(|t| digest(runner, records, t))
            .collect();
        for target in styled {
            let Some(d) = digest(runner, records, target) else {
                continue;
            };
            if text_digests.contains(&d) {
                removals.push((
                    target.record,
                    format!("{} styled subtitle converted from a kept text track", language),
                ));
            }
        }
    }
    removals
}
