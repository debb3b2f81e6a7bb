//! Types for audio fidelity comparison.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::FidelitySettings;
use crate::runner::RunError;

/// Error type for fidelity comparison.
#[derive(Error, Debug)]
pub enum FidelityError {
    #[error("Segment extraction failed: {0}")]
    Extraction(#[from] RunError),

    #[error("Failed to read segment {path}: {message}")]
    InvalidSegment { path: PathBuf, message: String },

    #[error("Correlation failed: {0}")]
    Correlation(String),

    #[error("Failed to build correlation pool: {0}")]
    Pool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fidelity comparison.
pub type FidelityResult<T> = Result<T, FidelityError>;

/// Outcome of correlating one segment of two tracks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentFidelity {
    /// Normalized similarity, 0..=1.
    pub score: f64,
    /// Strength of the runner-up peak, 0..=1.
    pub secondary: f64,
    /// Offset of the second track relative to the first, in samples.
    pub delay_samples: i64,
}

/// External capability that compares two decoded audio segments.
///
/// Implementations must be shareable across the correlation pool.
pub trait FidelityCorrelator: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Compare two PCM WAV files of the same layout.
    fn correlate(&self, reference: &Path, other: &Path) -> FidelityResult<SegmentFidelity>;
}

/// Per-pair segment results, keyed by unordered candidate positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FidelityMatrix {
    pairs: BTreeMap<(usize, usize), Vec<SegmentFidelity>>,
}

impl FidelityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(i: usize, j: usize) -> (usize, usize) {
        if i <= j {
            (i, j)
        } else {
            (j, i)
        }
    }

    /// Record one segment result for the pair.
    pub fn push(&mut self, i: usize, j: usize, result: SegmentFidelity) {
        self.pairs.entry(Self::key(i, j)).or_default().push(result);
    }

    /// Results for the pair, in either order.
    pub fn get(&self, i: usize, j: usize) -> &[SegmentFidelity] {
        self.pairs
            .get(&Self::key(i, j))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

/// Decoding layout shared by every candidate of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonProfile {
    pub channels: u32,
    pub sample_rate: u32,
}

impl ComparisonProfile {
    /// Mono if any candidate is mono, else stereo; the lowest sample rate.
    ///
    /// `None` when the list is empty or a rate is unknown.
    pub fn for_candidates(layouts: &[(u32, u32)]) -> Option<Self> {
        let sample_rate = layouts.iter().map(|&(_, rate)| rate).min()?;
        if sample_rate == 0 {
            return None;
        }
        let channels = if layouts.iter().any(|&(ch, _)| ch == 1) {
            1
        } else {
            2
        };
        Some(Self {
            channels,
            sample_rate,
        })
    }
}

/// Thresholds used to call a pair a duplicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_score: f64,
    pub max_delay_samples: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_score: 0.90,
            max_delay_samples: 128,
        }
    }
}

impl From<&FidelitySettings> for Thresholds {
    fn from(settings: &FidelitySettings) -> Self {
        Self {
            min_score: settings.min_score,
            max_delay_samples: settings.max_delay_samples,
        }
    }
}
