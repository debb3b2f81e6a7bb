//! Best-track selection inside a duplicate cluster.
//!
//! Every pair of cluster members is compared once. Format rules decide
//! first; tracks of the same (or declared-equal) format are compared on
//! layout, sample rate and bitrate. A track that loses any comparison is
//! dropped.

use crate::models::{AudioProps, StreamRecord};
use crate::rules::{normalize_name, Dominance, RuleGraph};

/// Share of the other track's per-channel bitrate a wider track must reach.
pub const PER_CHANNEL_BITRATE_RATIO: f64 = 0.95;

/// Outcome of comparing two audio tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    First,
    Second,
    /// No confident answer; both tracks stay.
    Undecided,
}

impl Verdict {
    fn flip(self) -> Self {
        match self {
            Verdict::First => Verdict::Second,
            Verdict::Second => Verdict::First,
            Verdict::Undecided => Verdict::Undecided,
        }
    }
}

/// Compare `a` (the earlier track) with `b`.
pub fn compare(a: &AudioProps, b: &AudioProps, graph: &RuleGraph) -> Verdict {
    let fa = normalize_name(&a.format);
    let fb = normalize_name(&b.format);

    if fa == fb || graph.are_peers(&fa, &fb) {
        return compare_same_format(a, b);
    }

    match graph.dominance(&fa, &fb) {
        Dominance::Always => return rule_win(a, b),
        Dominance::RatioAtLeast(x) => return ratio_win(a, b, x),
        Dominance::None => {}
    }
    match graph.dominance(&fb, &fa) {
        Dominance::Always => rule_win(b, a).flip(),
        Dominance::RatioAtLeast(x) => ratio_win(b, a, x).flip(),
        Dominance::None => Verdict::Undecided,
    }
}

fn rule_win(winner: &AudioProps, loser: &AudioProps) -> Verdict {
    if winner.sampling_rate >= loser.sampling_rate {
        Verdict::First
    } else {
        Verdict::Undecided
    }
}

fn ratio_win(winner: &AudioProps, loser: &AudioProps, ratio: f64) -> Verdict {
    match (winner.bitrate, loser.bitrate) {
        (Some(w), Some(l)) if w as f64 >= ratio * l as f64 => Verdict::First,
        _ => Verdict::Undecided,
    }
}

/// Layout, then sample rate, then bitrate. Exact ties go to `a`.
pub fn compare_same_format(a: &AudioProps, b: &AudioProps) -> Verdict {
    if a.channels != b.channels {
        let a_wider = a.channels > b.channels;
        let (wide, narrow) = if a_wider { (a, b) } else { (b, a) };

        let rate_ok = wide.sampling_rate >= narrow.sampling_rate;
        let bitrate_ok = match (wide.bitrate_per_channel(), narrow.bitrate_per_channel()) {
            (Some(w), Some(n)) => w >= PER_CHANNEL_BITRATE_RATIO * n,
            _ => true,
        };

        let wide_wins = rate_ok && bitrate_ok;
        return if wide_wins == a_wider {
            Verdict::First
        } else {
            Verdict::Second
        };
    }

    if a.sampling_rate != b.sampling_rate {
        return if a.sampling_rate > b.sampling_rate {
            Verdict::First
        } else {
            Verdict::Second
        };
    }

    if b.bitrate > a.bitrate {
        Verdict::Second
    } else {
        Verdict::First
    }
}

/// Members of a cluster that lose, with the reason.
///
/// `members` are record indices in probe order. If every member would
/// lose (a cycle in the rules), the earliest one is spared.
pub fn select_losers(
    records: &[StreamRecord],
    members: &[usize],
    graph: &RuleGraph,
) -> Vec<(usize, String)> {
    let audio: Vec<(usize, &AudioProps)> = members
        .iter()
        .filter_map(|&i| records[i].as_audio().map(|a| (i, a)))
        .collect();

    let mut lost: Vec<Option<String>> = vec![None; audio.len()];
    for x in 0..audio.len() {
        for y in x + 1..audio.len() {
            let (ix, ax) = audio[x];
            let (iy, ay) = audio[y];
            match compare(ax, ay, graph) {
                Verdict::First => {
                    lost[y].get_or_insert_with(|| format!("worse than {}", records[ix].label()));
                }
                Verdict::Second => {
                    lost[x].get_or_insert_with(|| format!("worse than {}", records[iy].label()));
                }
                Verdict::Undecided => {
                    tracing::debug!(
                        "No rule decides {} vs {}, keeping both",
                        records[ix].label(),
                        records[iy].label()
                    );
                }
            }
        }
    }

    if !lost.is_empty() && lost.iter().all(Option::is_some) {
        tracing::warn!(
            "Every member of a cluster lost a comparison; sparing {}",
            records[audio[0].0].label()
        );
        lost[0] = None;
    }

    audio
        .iter()
        .zip(lost)
        .filter_map(|(&(i, _), reason)| reason.map(|r| (i, r)))
        .collect()
}
