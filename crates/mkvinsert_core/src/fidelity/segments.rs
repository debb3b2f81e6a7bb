//! Segment positions for fidelity comparison.
//!
//! Pure functions: where to cut each candidate, and the ffmpeg call that
//! decodes one cut to PCM.

use std::path::Path;

use serde::Serialize;

use super::types::ComparisonProfile;
use crate::models::{Invocation, Tool};

/// Shortest segment worth correlating, in seconds.
pub const MIN_SEGMENT_SECS: f64 = 1.0;

/// One cut, shared by every candidate of the group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub index: usize,
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// Cuts for one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentPlan {
    pub segments: Vec<Segment>,
    /// Length of a regular cut; the midpoint cut is twice as long.
    pub segment_secs: f64,
}

impl SegmentPlan {
    /// Plan `cuts` evenly spaced segments between 5% and 95% of `shortest`,
    /// plus one double-length segment centred on the midpoint.
    ///
    /// Segment length is `min(max_window, shortest / (cuts + 3))`. Returns
    /// `None` when the input is too short to hold the cuts.
    pub fn new(shortest: f64, cuts: usize, max_window: f64) -> Option<Self> {
        if cuts == 0 || !shortest.is_finite() || shortest <= 0.0 {
            return None;
        }

        let segment_secs = max_window.min(shortest / (cuts as f64 + 3.0));
        if segment_secs < MIN_SEGMENT_SECS {
            return None;
        }

        let start_time = shortest * 0.05;
        let end_time = shortest * 0.95;
        let usable = end_time - start_time - segment_secs;
        if usable <= 0.0 {
            return None;
        }

        let starts: Vec<f64> = if cuts == 1 {
            vec![start_time + usable / 2.0]
        } else {
            let step = usable / (cuts - 1) as f64;
            (0..cuts).map(|i| start_time + i as f64 * step).collect()
        };

        let mut segments: Vec<Segment> = starts
            .into_iter()
            .enumerate()
            .map(|(index, start_secs)| Segment {
                index,
                start_secs,
                duration_secs: segment_secs,
            })
            .collect();

        segments.push(Segment {
            index: cuts,
            start_secs: (shortest / 2.0 - segment_secs).max(0.0),
            duration_secs: segment_secs * 2.0,
        });

        Some(Self {
            segments,
            segment_secs,
        })
    }

    /// Number of cuts including the midpoint one.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Decode one segment of one stream to 16-bit PCM WAV.
pub fn segment_invocation(
    input: &Path,
    stream_order: u32,
    segment: &Segment,
    profile: &ComparisonProfile,
    output: &Path,
) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-v", "error", "-y", "-ss"])
        .arg(format!("{:.3}", segment.start_secs))
        .arg("-t")
        .arg(format!("{:.3}", segment.duration_secs))
        .arg("-i")
        .arg(input.to_string_lossy())
        .arg("-map")
        .arg(format!("0:{}", stream_order))
        .arg("-ac")
        .arg(profile.channels.to_string())
        .arg("-ar")
        .arg(profile.sample_rate.to_string())
        .args(["-c:a", "pcm_s16le"])
        .arg(output.to_string_lossy())
}
