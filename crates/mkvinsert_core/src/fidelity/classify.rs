//! Duplicate classification and clustering.
//!
//! Pure functions over segment results; no I/O.

use std::collections::BTreeSet;

use super::types::{FidelityMatrix, SegmentFidelity, Thresholds};

/// Verdict for one pair of candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum PairClass {
    /// Same audio, aligned closely enough to swap one for the other.
    Duplicate,
    /// Different audio, misaligned, or no data.
    Distinct(DistinctReason),
}

impl PairClass {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, PairClass::Duplicate)
    }
}

/// Why a pair is not a duplicate.
#[derive(Debug, Clone, PartialEq)]
pub enum DistinctReason {
    NoData,
    LowScore { mean: f64 },
    /// High score but the delays rule out a swap.
    Misaligned { mean: f64, delays: Vec<i64> },
}

/// Mean score of the segment results.
pub fn mean_score(results: &[SegmentFidelity]) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    Some(results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64)
}

/// Classify one pair from its segment results.
///
/// Duplicate when the mean score reaches `min_score` and the delays are
/// all zero, all equal and small, or take exactly two small values. The
/// verdict does not depend on which track was the reference: swapping
/// the pair negates every delay, which preserves all three patterns.
pub fn classify(results: &[SegmentFidelity], thresholds: &Thresholds) -> PairClass {
    let Some(mean) = mean_score(results) else {
        return PairClass::Distinct(DistinctReason::NoData);
    };

    if mean < thresholds.min_score {
        return PairClass::Distinct(DistinctReason::LowScore { mean });
    }

    let delays: Vec<i64> = results.iter().map(|r| r.delay_samples).collect();
    let distinct: BTreeSet<i64> = delays.iter().copied().collect();
    let small = |d: &i64| d.abs() < thresholds.max_delay_samples;

    let aligned = distinct.iter().all(|&d| d == 0)
        || (distinct.len() == 1 && distinct.iter().all(small))
        || (distinct.len() == 2 && distinct.iter().all(small));

    if aligned {
        PairClass::Duplicate
    } else {
        PairClass::Distinct(DistinctReason::Misaligned { mean, delays })
    }
}

/// Classify the pair `(i, j)` from the matrix.
pub fn classify_pair(
    matrix: &FidelityMatrix,
    i: usize,
    j: usize,
    thresholds: &Thresholds,
) -> PairClass {
    classify(matrix.get(i, j), thresholds)
}

/// Group `count` candidates into disjoint duplicate clusters.
///
/// Candidates are walked in order; each unassigned one opens a cluster and
/// pulls in later unassigned candidates that are duplicates of every
/// member accepted so far. Singletons are returned too.
pub fn cluster<F>(count: usize, is_duplicate: F) -> Vec<Vec<usize>>
where
    F: Fn(usize, usize) -> bool,
{
    let mut assigned = vec![false; count];
    let mut clusters = Vec::new();

    for main in 0..count {
        if assigned[main] {
            continue;
        }
        assigned[main] = true;
        let mut members = vec![main];

        for candidate in main + 1..count {
            if assigned[candidate] {
                continue;
            }
            if members.iter().all(|&m| is_duplicate(m, candidate)) {
                assigned[candidate] = true;
                members.push(candidate);
            }
        }

        clusters.push(members);
    }

    clusters
}
