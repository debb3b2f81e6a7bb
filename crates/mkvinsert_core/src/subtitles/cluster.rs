//! Per-language subtitle clusters keyed by normalized title.

use std::collections::BTreeMap;

use serde::Serialize;

use super::title::normalize_title;
use crate::models::{StreamRecord, SubtitleCategory, SubtitleCodecClass};

/// Kept subtitles of one normalized title, split by category and codec
/// family. Every list is in probe order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TitleVariants {
    pub forced_srt: Vec<usize>,
    pub forced_ass: Vec<usize>,
    pub hi_srt: Vec<usize>,
    pub hi_ass: Vec<usize>,
    pub dub_srt: Vec<usize>,
    pub dub_ass: Vec<usize>,
    pub srt: Vec<usize>,
    pub ass: Vec<usize>,
}

impl TitleVariants {
    /// Text and graphic lists of one category.
    pub fn variants(&self, category: SubtitleCategory) -> (&[usize], &[usize]) {
        match category {
            SubtitleCategory::Forced => (&self.forced_srt, &self.forced_ass),
            SubtitleCategory::HearingImpaired => (&self.hi_srt, &self.hi_ass),
            SubtitleCategory::Dubtitle => (&self.dub_srt, &self.dub_ass),
            SubtitleCategory::Plain => (&self.srt, &self.ass),
        }
    }

    fn push(&mut self, category: SubtitleCategory, graphic: bool, index: usize) {
        let list = match (category, graphic) {
            (SubtitleCategory::Forced, false) => &mut self.forced_srt,
            (SubtitleCategory::Forced, true) => &mut self.forced_ass,
            (SubtitleCategory::HearingImpaired, false) => &mut self.hi_srt,
            (SubtitleCategory::HearingImpaired, true) => &mut self.hi_ass,
            (SubtitleCategory::Dubtitle, false) => &mut self.dub_srt,
            (SubtitleCategory::Dubtitle, true) => &mut self.dub_ass,
            (SubtitleCategory::Plain, false) => &mut self.srt,
            (SubtitleCategory::Plain, true) => &mut self.ass,
        };
        list.push(index);
    }
}

/// Kept subtitles of one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubtitleCluster {
    pub titles: BTreeMap<String, TitleVariants>,
    /// Tracks ffmpeg cannot re-encode. Counted against the budget, never collapsed.
    pub uncodable: Vec<usize>,
}

impl SubtitleCluster {
    /// Number of tracks in the cluster.
    pub fn len(&self) -> usize {
        self.indices().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record index of the cluster, ascending.
    pub fn indices(&self) -> Vec<usize> {
        let mut all = self.uncodable.clone();
        for v in self.titles.values() {
            for list in [
                &v.forced_srt,
                &v.forced_ass,
                &v.hi_srt,
                &v.hi_ass,
                &v.dub_srt,
                &v.dub_ass,
                &v.srt,
                &v.ass,
            ] {
                all.extend_from_slice(list);
            }
        }
        all.sort_unstable();
        all
    }
}

/// Cluster the kept subtitles by language, then normalized title.
///
/// Rebuilt before every pruning step so discarded tracks never reappear.
pub fn build_clusters(records: &[StreamRecord]) -> BTreeMap<String, SubtitleCluster> {
    let mut clusters: BTreeMap<String, SubtitleCluster> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        if !record.keep() {
            continue;
        }
        let Some(sub) = record.as_subtitle() else {
            continue;
        };
        let cluster = clusters.entry(record.language.clone()).or_default();
        match sub.codec_class {
            SubtitleCodecClass::Uncodable => cluster.uncodable.push(index),
            class => cluster
                .titles
                .entry(normalize_title(&record.title))
                .or_default()
                .push(sub.category(), class == SubtitleCodecClass::Graphic, index),
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{audio, forced_subtitle, hi_subtitle, subtitle};

    #[test]
    fn splits_by_language_title_and_codec() {
        let mut records = vec![
            subtitle(1, "en", "subrip", "English"),
            hi_subtitle(2, "en", "hdmv_pgs_subtitle", "English [SDH]"),
            hi_subtitle(3, "en", "subrip", "English SDH"),
            forced_subtitle(4, "fr", "ass", "Français (Forced)"),
            subtitle(5, "fr", "arib_caption", ""),
            audio(6, "en", "ac3", 6, 48000, 448_000),
            subtitle(7, "en", "subrip", "English"),
        ];
        records[6].discard("test");

        let clusters = build_clusters(&records);
        assert_eq!(clusters.len(), 2);

        let en = &clusters["en"];
        let english = &en.titles["english"];
        assert_eq!(english.srt, vec![0]);
        assert_eq!(english.hi_ass, vec![1]);
        assert_eq!(english.hi_srt, vec![2]);
        assert_eq!(en.len(), 3);

        let fr = &clusters["fr"];
        assert_eq!(fr.titles["français"].forced_ass, vec![3]);
        assert_eq!(fr.uncodable, vec![4]);
        assert_eq!(fr.len(), 2);
        assert_eq!(fr.indices(), vec![3, 4]);
    }
}
