//! Subtitle grouping, deduplication and budget pruning.
//!
//! # Components
//!
//! - **title**: title normalization used as the clustering key
//! - **cluster**: per-language clusters split by category and codec family
//! - **budget**: language policy, forced collapse and the pruning cascade
//! - **converted**: styled tracks that re-encode a kept text track
//!
//! # Usage
//!
//! ```ignore
//! use mkvinsert_core::subtitles::{reduce_subtitles, LanguagePolicy};
//!
//! let policy = LanguagePolicy::new(["fr", "en"], ["ja"]);
//! let summary = reduce_subtitles(&mut records, &policy, false, 30);
//! assert!(summary.budget.after <= summary.budget.before);
//! ```

mod budget;
mod cluster;
mod converted;
mod title;

use crate::models::StreamRecord;

pub use budget::{
    always_keep_collapse, apply_removals, cascade, collapse_forced, drop_excluded_languages,
    dubtitle_twin_collapse, excluded_collapse, excluded_one_graphic,
    hearing_impaired_twin_collapse, kept_stream_count, outside_keep_list, plain_twin_collapse,
    prune_to_budget, try_keep_collapse, try_keep_one_graphic, LanguagePolicy, LanguageTier,
    PruneInput, PruneReport, PruneStep, Removal,
};
pub use cluster::{build_clusters, SubtitleCluster, TitleVariants};
pub use converted::{find_converted_duplicates, renders_text, text_digest_invocation, DigestTarget};
pub use title::normalize_title;

/// Counts from one subtitle reduction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleSummary {
    pub outside_keep: usize,
    pub forced_collapsed: usize,
    pub budget: PruneReport,
}

/// Optional language filter, forced collapse, then the budget cascade.
pub fn reduce_subtitles(
    records: &mut [StreamRecord],
    policy: &LanguagePolicy,
    remove_outside_keep: bool,
    max_streams: usize,
) -> SubtitleSummary {
    let outside_keep = if remove_outside_keep {
        let removals = outside_keep_list(records, policy);
        apply_removals(records, removals)
    } else {
        0
    };

    let removals = collapse_forced(records);
    let forced_collapsed = apply_removals(records, removals);

    let budget = prune_to_budget(records, policy, max_streams);

    SubtitleSummary {
        outside_keep,
        forced_collapsed,
        budget,
    }
}
