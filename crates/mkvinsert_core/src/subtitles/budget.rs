//! Stream budget enforcement.
//!
//! The budget counts every kept audio and subtitle track. When the count is
//! over `max_streams`, an ordered list of reduction steps runs until the
//! count fits. Redundant encodings of the same content go first, then
//! whole low-priority languages. Each step is a pure function from the
//! current records to a list of removals; only the driver calls
//! [`StreamRecord::discard`].

use std::collections::BTreeSet;

use crate::config::MergeSettings;
use crate::models::{StreamRecord, SubtitleCategory};
use crate::probe::normalize_language;

use super::cluster::{build_clusters, SubtitleCluster};

/// Record index to drop, with the reason.
pub type Removal = (usize, String);

/// Priority of a subtitle language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageTier {
    AlwaysKeep,
    TryKeep,
    Excluded,
}

/// Always-keep and try-to-keep language sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguagePolicy {
    always_keep: BTreeSet<String>,
    try_keep: BTreeSet<String>,
}

impl LanguagePolicy {
    pub fn new<A, T, S>(always_keep: A, try_keep: T) -> Self
    where
        A: IntoIterator<Item = S>,
        T: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalize = |langs: Vec<S>| -> BTreeSet<String> {
            langs
                .iter()
                .map(|l| l.as_ref().trim())
                .filter(|l| !l.is_empty())
                .map(normalize_language)
                .collect()
        };
        Self {
            always_keep: normalize(always_keep.into_iter().collect()),
            try_keep: normalize(try_keep.into_iter().collect()),
        }
    }

    pub fn from_settings(settings: &MergeSettings) -> Self {
        Self::new(&settings.always_keep_languages, &settings.try_keep_languages)
    }

    /// Always-keep wins when a language is listed twice.
    pub fn tier(&self, language: &str) -> LanguageTier {
        if self.always_keep.contains(language) {
            LanguageTier::AlwaysKeep
        } else if self.try_keep.contains(language) {
            LanguageTier::TryKeep
        } else {
            LanguageTier::Excluded
        }
    }

    pub fn always_keep(&self) -> &BTreeSet<String> {
        &self.always_keep
    }
}

/// Read-only view handed to each reduction step.
pub struct PruneInput<'a> {
    pub records: &'a [StreamRecord],
    pub policy: &'a LanguagePolicy,
    /// Tracks over budget; always at least 1 when a step runs.
    pub excess: usize,
}

/// One named reduction step.
pub struct PruneStep {
    pub name: &'static str,
    pub reduce: fn(&PruneInput<'_>) -> Vec<Removal>,
}

/// What the cascade did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub before: usize,
    pub after: usize,
    pub max_streams: usize,
    /// Steps that ran, in order.
    pub steps_run: Vec<&'static str>,
}

impl PruneReport {
    pub fn within_budget(&self) -> bool {
        self.after <= self.max_streams
    }
}

const ALL_TIERS: [LanguageTier; 3] = [
    LanguageTier::AlwaysKeep,
    LanguageTier::TryKeep,
    LanguageTier::Excluded,
];

const COLLAPSIBLE: [SubtitleCategory; 3] = [
    SubtitleCategory::HearingImpaired,
    SubtitleCategory::Dubtitle,
    SubtitleCategory::Plain,
];

const ALL_CATEGORIES: [SubtitleCategory; 4] = [
    SubtitleCategory::Forced,
    SubtitleCategory::HearingImpaired,
    SubtitleCategory::Dubtitle,
    SubtitleCategory::Plain,
];

/// Number of kept audio and subtitle tracks.
pub fn kept_stream_count(records: &[StreamRecord]) -> usize {
    records.iter().filter(|r| r.keep()).count()
}

fn clusters_in(input: &PruneInput<'_>, tiers: &[LanguageTier]) -> Vec<(String, SubtitleCluster)> {
    build_clusters(input.records)
        .into_iter()
        .filter(|(lang, _)| tiers.contains(&input.policy.tier(lang)))
        .collect()
}

/// Keep the first text variant of each title and category; drop the other
/// text variants and every graphic one. With `needs_graphic_twin`, only
/// titles that have a graphic variant of the category are touched.
fn collapse(
    input: &PruneInput<'_>,
    tiers: &[LanguageTier],
    categories: &[SubtitleCategory],
    needs_graphic_twin: bool,
) -> Vec<Removal> {
    let mut removals = Vec::new();
    for (lang, cluster) in clusters_in(input, tiers) {
        for (title, variants) in &cluster.titles {
            for &category in categories {
                let (text, graphic) = variants.variants(category);
                let Some(&kept) = text.first() else {
                    continue;
                };
                if needs_graphic_twin && graphic.is_empty() {
                    continue;
                }
                let reason = format!(
                    "{} {} subtitle \"{}\" already covered by {}",
                    lang,
                    category,
                    title,
                    input.records[kept].label()
                );
                removals.extend(
                    text[1..]
                        .iter()
                        .chain(graphic.iter())
                        .map(|&i| (i, reason.clone())),
                );
            }
        }
    }
    removals
}

/// Keep the first graphic variant of each title, whatever its category.
fn one_graphic_per_title(input: &PruneInput<'_>, tiers: &[LanguageTier]) -> Vec<Removal> {
    let mut removals = Vec::new();
    for (lang, cluster) in clusters_in(input, tiers) {
        for (title, variants) in &cluster.titles {
            let mut graphic: Vec<usize> = ALL_CATEGORIES
                .iter()
                .flat_map(|&category| variants.variants(category).1.iter().copied())
                .collect();
            graphic.sort_unstable();
            let Some((&kept, rest)) = graphic.split_first() else {
                continue;
            };
            let reason = format!(
                "{} subtitle \"{}\": image variant {} kept",
                lang,
                title,
                input.records[kept].label()
            );
            removals.extend(rest.iter().map(|&i| (i, reason.clone())));
        }
    }
    removals
}

pub fn hearing_impaired_twin_collapse(input: &PruneInput<'_>) -> Vec<Removal> {
    collapse(input, &ALL_TIERS, &[SubtitleCategory::HearingImpaired], true)
}

pub fn dubtitle_twin_collapse(input: &PruneInput<'_>) -> Vec<Removal> {
    collapse(input, &ALL_TIERS, &[SubtitleCategory::Dubtitle], true)
}

pub fn plain_twin_collapse(input: &PruneInput<'_>) -> Vec<Removal> {
    collapse(input, &ALL_TIERS, &[SubtitleCategory::Plain], true)
}

pub fn excluded_collapse(input: &PruneInput<'_>) -> Vec<Removal> {
    collapse(input, &[LanguageTier::Excluded], &COLLAPSIBLE, false)
}

pub fn try_keep_collapse(input: &PruneInput<'_>) -> Vec<Removal> {
    collapse(input, &[LanguageTier::TryKeep], &COLLAPSIBLE, false)
}

pub fn excluded_one_graphic(input: &PruneInput<'_>) -> Vec<Removal> {
    one_graphic_per_title(input, &[LanguageTier::Excluded])
}

pub fn always_keep_collapse(input: &PruneInput<'_>) -> Vec<Removal> {
    collapse(input, &[LanguageTier::AlwaysKeep], &COLLAPSIBLE, false)
}

/// Drop whole excluded languages in alphabetical order until `excess`
/// tracks are gone.
pub fn drop_excluded_languages(input: &PruneInput<'_>) -> Vec<Removal> {
    let mut removals = Vec::new();
    for (lang, cluster) in clusters_in(input, &[LanguageTier::Excluded]) {
        if removals.len() >= input.excess {
            break;
        }
        let reason = format!("{} subtitles dropped to meet the stream budget", lang);
        removals.extend(cluster.indices().into_iter().map(|i| (i, reason.clone())));
    }
    removals
}

pub fn try_keep_one_graphic(input: &PruneInput<'_>) -> Vec<Removal> {
    one_graphic_per_title(input, &[LanguageTier::TryKeep])
}

/// The reduction steps in the order they are tried.
pub fn cascade() -> Vec<PruneStep> {
    vec![
        PruneStep {
            name: "hearing-impaired twin collapse",
            reduce: hearing_impaired_twin_collapse,
        },
        PruneStep {
            name: "dubtitle twin collapse",
            reduce: dubtitle_twin_collapse,
        },
        PruneStep {
            name: "plain twin collapse",
            reduce: plain_twin_collapse,
        },
        PruneStep {
            name: "excluded language collapse",
            reduce: excluded_collapse,
        },
        PruneStep {
            name: "try-keep language collapse",
            reduce: try_keep_collapse,
        },
        PruneStep {
            name: "excluded language image dedup",
            reduce: excluded_one_graphic,
        },
        PruneStep {
            name: "always-keep language collapse",
            reduce: always_keep_collapse,
        },
        PruneStep {
            name: "excluded language drop",
            reduce: drop_excluded_languages,
        },
        PruneStep {
            name: "try-keep language image dedup",
            reduce: try_keep_one_graphic,
        },
    ]
}

/// Keep one text forced track per language and title.
pub fn collapse_forced(records: &[StreamRecord]) -> Vec<Removal> {
    let mut removals = Vec::new();
    for (lang, cluster) in build_clusters(records) {
        for (title, variants) in &cluster.titles {
            let (text, _) = variants.variants(SubtitleCategory::Forced);
            let Some(&kept) = text.first() else {
                continue;
            };
            let reason = format!(
                "{} forced subtitle \"{}\" already covered by {}",
                lang,
                title,
                records[kept].label()
            );
            removals.extend(text[1..].iter().map(|&i| (i, reason.clone())));
        }
    }
    removals
}

/// Subtitles whose language is not in the always-keep list.
///
/// An empty list removes nothing.
pub fn outside_keep_list(records: &[StreamRecord], policy: &LanguagePolicy) -> Vec<Removal> {
    if policy.always_keep().is_empty() {
        tracing::warn!("No always-keep languages configured, keeping every subtitle language");
        return Vec::new();
    }
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.keep() && r.as_subtitle().is_some())
        .filter(|(_, r)| policy.tier(&r.language) != LanguageTier::AlwaysKeep)
        .map(|(i, r)| (i, format!("{} is not an always-keep language", r.language)))
        .collect()
}

/// Apply removals; returns how many records were newly dropped.
pub fn apply_removals(records: &mut [StreamRecord], removals: Vec<Removal>) -> usize {
    let mut dropped = 0;
    for (index, reason) in removals {
        let label = records[index].label();
        if records[index].discard(reason.as_str()) {
            tracing::debug!("Dropping {}: {}", label, reason);
            dropped += 1;
        }
    }
    dropped
}

/// Run the cascade until the kept count fits `max_streams` or every step
/// has run.
pub fn prune_to_budget(
    records: &mut [StreamRecord],
    policy: &LanguagePolicy,
    max_streams: usize,
) -> PruneReport {
    let before = kept_stream_count(records);
    let mut count = before;
    let mut steps_run = Vec::new();

    for step in cascade() {
        if count <= max_streams {
            break;
        }
        let removals = (step.reduce)(&PruneInput {
            records: &*records,
            policy,
            excess: count - max_streams,
        });
        let dropped = apply_removals(records, removals);
        count -= dropped;
        tracing::debug!("{}: dropped {}, {} streams left", step.name, dropped, count);
        steps_run.push(step.name);
    }

    if count > max_streams {
        tracing::warn!(
            "Stream budget {} not reachable, keeping {} streams",
            max_streams,
            count
        );
    }

    PruneReport {
        before,
        after: count,
        max_streams,
        steps_run,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{audio, forced_subtitle, hi_subtitle, subtitle};

    fn kept(records: &[StreamRecord]) -> Vec<usize> {
        records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.keep())
            .map(|(i, _)| i)
            .collect()
    }

    fn policy(always: &[&str], try_keep: &[&str]) -> LanguagePolicy {
        LanguagePolicy::new(always.iter().copied(), try_keep.iter().copied())
    }

    #[test]
    fn policy_normalizes_and_prefers_always_keep() {
        let p = policy(&["fre", "EN"], &["fr", "ja"]);
        assert_eq!(p.tier("fr"), LanguageTier::AlwaysKeep);
        assert_eq!(p.tier("en"), LanguageTier::AlwaysKeep);
        assert_eq!(p.tier("ja"), LanguageTier::TryKeep);
        assert_eq!(p.tier("de"), LanguageTier::Excluded);
    }

    #[test]
    fn forced_text_tracks_collapse_within_budget() {
        let mut records = vec![
            forced_subtitle(1, "fr", "subrip", "Forced"),
            forced_subtitle(2, "fr", "subrip", "[Forced]"),
            forced_subtitle(3, "fr", "subrip", "forced"),
            forced_subtitle(4, "en", "subrip", "Forced"),
            forced_subtitle(5, "en", "subrip", "Forced"),
            forced_subtitle(6, "en", "subrip", "(forced)"),
        ];
        let removals = collapse_forced(&records);
        assert_eq!(apply_removals(&mut records, removals), 4);
        assert_eq!(kept(&records), vec![0, 3]);

        let report = prune_to_budget(&mut records, &policy(&["fr"], &[]), 4);
        assert!(report.within_budget());
        assert!(report.steps_run.is_empty());
        assert_eq!(kept(&records), vec![0, 3]);
    }

    #[test]
    fn forced_collapse_leaves_graphic_variants() {
        let records = vec![
            forced_subtitle(1, "fr", "subrip", "Forced"),
            forced_subtitle(2, "fr", "hdmv_pgs_subtitle", "Forced"),
        ];
        assert!(collapse_forced(&records).is_empty());
    }

    #[test]
    fn twin_collapse_runs_before_language_drops() {
        let mut records = vec![
            subtitle(1, "en", "subrip", "English"),
            subtitle(2, "en", "hdmv_pgs_subtitle", "English"),
            subtitle(3, "de", "subrip", "Deutsch"),
            subtitle(4, "ja", "subrip", "Japanese"),
        ];
        let report = prune_to_budget(&mut records, &policy(&["en"], &[]), 3);
        assert_eq!(kept(&records), vec![0, 2, 3]);
        assert_eq!(
            report.steps_run,
            vec![
                "hearing-impaired twin collapse",
                "dubtitle twin collapse",
                "plain twin collapse"
            ]
        );
        assert_eq!((report.before, report.after), (4, 3));
    }

    #[test]
    fn hearing_impaired_twin_needs_graphic_variant() {
        let records = vec![
            hi_subtitle(1, "en", "subrip", "English SDH"),
            hi_subtitle(2, "en", "subrip", "English [SDH]"),
        ];
        let p = policy(&[], &[]);
        let input = PruneInput {
            records: &records,
            policy: &p,
            excess: 1,
        };
        assert!(hearing_impaired_twin_collapse(&input).is_empty());
        // Without the twin requirement the second text copy goes.
        let removed: Vec<usize> = excluded_collapse(&input).into_iter().map(|(i, _)| i).collect();
        assert_eq!(removed, vec![1]);
    }

    #[test]
    fn excluded_languages_drop_alphabetically() {
        let mut records = vec![
            subtitle(1, "en", "subrip", "English"),
            subtitle(2, "ja", "subrip", "Japanese"),
            subtitle(3, "de", "subrip", "Deutsch"),
            subtitle(4, "it", "subrip", "Italiano"),
            subtitle(5, "fr", "subrip", "Français"),
        ];
        let report = prune_to_budget(&mut records, &policy(&["en"], &["fr"]), 3);
        assert_eq!(kept(&records), vec![0, 1, 4]);
        assert_eq!(report.steps_run.last(), Some(&"excluded language drop"));
    }

    #[test]
    fn image_dedup_precedes_language_drop() {
        let mut records = vec![
            subtitle(1, "en", "subrip", "English"),
            subtitle(2, "de", "hdmv_pgs_subtitle", "Deutsch"),
            subtitle(3, "de", "dvd_subtitle", "Deutsch"),
        ];
        let report = prune_to_budget(&mut records, &policy(&["en"], &[]), 2);
        assert_eq!(kept(&records), vec![0, 1]);
        assert_eq!(report.steps_run.last(), Some(&"excluded language image dedup"));
    }

    #[test]
    fn image_dedup_spans_categories() {
        let mut records = vec![
            subtitle(1, "en", "subrip", "English"),
            subtitle(2, "de", "hdmv_pgs_subtitle", "Deutsch"),
            hi_subtitle(3, "de", "hdmv_pgs_subtitle", "Deutsch SDH"),
        ];
        let report = prune_to_budget(&mut records, &policy(&["en"], &[]), 2);
        assert_eq!(kept(&records), vec![0, 1]);
        assert_eq!(report.steps_run.last(), Some(&"excluded language image dedup"));
        assert!(!report.steps_run.contains(&"excluded language drop"));
    }

    #[test]
    fn always_keep_collapse_is_late() {
        let mut records = vec![
            subtitle(1, "en", "subrip", "English"),
            subtitle(2, "en", "subrip", "English"),
        ];
        let report = prune_to_budget(&mut records, &policy(&["en"], &[]), 1);
        assert_eq!(kept(&records), vec![0]);
        assert_eq!(report.steps_run.len(), 7);
    }

    #[test]
    fn unreachable_budget_stops_at_minimum() {
        let mut records = vec![
            audio(1, "en", "ac3", 6, 48000, 448_000),
            audio(2, "fr", "ac3", 6, 48000, 448_000),
            subtitle(3, "en", "subrip", "English"),
            subtitle(4, "en", "subrip", "Commentary"),
        ];
        let report = prune_to_budget(&mut records, &policy(&["en"], &[]), 1);
        assert!(!report.within_budget());
        assert_eq!(report.after, 4);
        assert!(report.after <= report.before);
        assert_eq!(report.steps_run.len(), cascade().len());
    }

    #[test]
    fn outside_keep_list_spares_audio_and_kept_languages() {
        let mut records = vec![
            audio(1, "de", "ac3", 6, 48000, 448_000),
            subtitle(2, "fr", "subrip", ""),
            subtitle(3, "de", "subrip", ""),
        ];
        let removals = outside_keep_list(&records, &policy(&["fre"], &[]));
        apply_removals(&mut records, removals);
        assert_eq!(kept(&records), vec![0, 1]);

        assert!(outside_keep_list(&records, &policy(&[], &[])).is_empty());
    }
}
