//! Language groups over the record arena.

use std::collections::BTreeMap;

use super::enums::TrackKind;
use super::media::StreamRecord;

/// Language code to ordered record indices, for one track kind.
///
/// Indices point into the session's record list; their order is probe order
/// (source file first) and only matters as a tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackGroup {
    pub kind: TrackKind,
    pub languages: BTreeMap<String, Vec<usize>>,
}

impl TrackGroup {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            languages: BTreeMap::new(),
        }
    }

    /// Indices of one language, empty when the language is absent.
    pub fn language(&self, language: &str) -> &[usize] {
        self.languages
            .get(language)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Indices still kept for one language.
    pub fn kept(&self, language: &str, records: &[StreamRecord]) -> Vec<usize> {
        self.language(language)
            .iter()
            .copied()
            .filter(|&i| records[i].keep())
            .collect()
    }
}

/// Build one group per kind present in `records`.
pub fn group_records(records: &[StreamRecord]) -> BTreeMap<TrackKind, TrackGroup> {
    let mut groups: BTreeMap<TrackKind, TrackGroup> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        let kind = record.kind();
        groups
            .entry(kind)
            .or_insert_with(|| TrackGroup::new(kind))
            .languages
            .entry(record.language.clone())
            .or_default()
            .push(index);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::fixtures::{audio, subtitle};

    #[test]
    fn groups_by_kind_and_language_in_probe_order() {
        let records = vec![
            audio(1, "eng", "ac3", 6, 48000, 448_000),
            subtitle(2, "eng", "subrip", ""),
            audio(3, "fre", "aac", 2, 48000, 192_000),
            audio(4, "eng", "eac3", 6, 48000, 640_000),
        ];
        let groups = group_records(&records);

        let audio_group = &groups[&TrackKind::Audio];
        assert_eq!(audio_group.language("eng"), &[0, 3]);
        assert_eq!(audio_group.language("fre"), &[2]);
        assert!(audio_group.language("ger").is_empty());
        assert_eq!(groups[&TrackKind::Subtitle].language("eng"), &[1]);
    }

    #[test]
    fn kept_skips_discarded() {
        let mut records = vec![
            audio(1, "eng", "ac3", 6, 48000, 448_000),
            audio(2, "eng", "ac3", 6, 48000, 448_000),
        ];
        records[0].discard("test");
        let groups = group_records(&records);
        assert_eq!(groups[&TrackKind::Audio].kept("eng", &records), vec![1]);
    }
}
