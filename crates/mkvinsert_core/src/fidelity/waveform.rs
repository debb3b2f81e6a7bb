//! FFT cross-correlation over PCM WAV segments.
//!
//! Built-in [`FidelityCorrelator`] so the binary works without an external
//! comparison service. Uses the convolution theorem:
//! corr(a, b) = IFFT(FFT(a) * conj(FFT(b))), normalized by the signal
//! energies so identical inputs peak at 1.0.

use std::path::Path;

use rustfft::{num_complex::Complex, FftPlanner};

use super::types::{FidelityCorrelator, FidelityError, FidelityResult, SegmentFidelity};

/// Window around the main peak ignored when looking for the runner-up, in
/// milliseconds.
const SECONDARY_EXCLUSION_MS: u32 = 10;

/// Correlates 16-bit WAV files with an FFT.
pub struct WaveformCorrelator {
    /// Only the first `max_secs` of each segment are compared.
    max_secs: f64,
}

impl WaveformCorrelator {
    pub fn new() -> Self {
        Self { max_secs: 10.0 }
    }

    /// Compare at most `max_secs` of each segment.
    pub fn with_max_secs(max_secs: f64) -> Self {
        Self {
            max_secs: max_secs.max(0.1),
        }
    }

    /// Read a WAV file, mix it down to mono and cap its length.
    fn load(&self, path: &Path) -> FidelityResult<(Vec<f64>, u32)> {
        let invalid = |message: String| FidelityError::InvalidSegment {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = hound::WavReader::open(path).map_err(|e| invalid(e.to_string()))?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(invalid(format!(
                "expected 16-bit integer PCM, got {:?} {} bit",
                spec.sample_format, spec.bits_per_sample
            )));
        }

        let channels = spec.channels.max(1) as usize;
        let max_frames = (self.max_secs * spec.sample_rate as f64) as usize;

        let mut mono = Vec::with_capacity(max_frames.min(reader.duration() as usize));
        let mut frame_sum = 0.0;
        let mut in_frame = 0;
        for sample in reader.samples::<i16>() {
            let sample = sample.map_err(|e| invalid(e.to_string()))?;
            frame_sum += sample as f64 / i16::MAX as f64;
            in_frame += 1;
            if in_frame == channels {
                mono.push(frame_sum / channels as f64);
                frame_sum = 0.0;
                in_frame = 0;
                if mono.len() >= max_frames {
                    break;
                }
            }
        }

        Ok((mono, spec.sample_rate))
    }
}

impl Default for WaveformCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalized cross-correlation with zero lag moved to the centre.
///
/// Index `n` holds the correlation when `other` is shifted by
/// `n - len / 2` samples.
fn cross_correlation(reference: &[f64], other: &[f64]) -> Vec<f64> {
    let correlation_len = reference.len() + other.len() - 1;
    let fft_len = correlation_len.next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(fft_len);
    let ifft = planner.plan_fft_inverse(fft_len);

    let to_complex = |signal: &[f64]| {
        let mut buffer: Vec<Complex<f64>> =
            signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
        buffer.resize(fft_len, Complex::new(0.0, 0.0));
        buffer
    };

    let mut ref_complex = to_complex(reference);
    let mut other_complex = to_complex(other);
    fft.process(&mut ref_complex);
    fft.process(&mut other_complex);

    let mut product: Vec<Complex<f64>> = ref_complex
        .iter()
        .zip(other_complex.iter())
        .map(|(a, b)| a * b.conj())
        .collect();
    ifft.process(&mut product);

    let ref_energy: f64 = reference.iter().map(|x| x * x).sum();
    let other_energy: f64 = other.iter().map(|x| x * x).sum();
    let norm = (ref_energy * other_energy).sqrt();
    let scale = if norm > 1e-10 {
        1.0 / (fft_len as f64 * norm)
    } else {
        1.0 / fft_len as f64
    };

    let half = fft_len / 2;
    let mut centered = vec![0.0; fft_len];
    for (i, value) in product.iter().enumerate() {
        centered[(i + half) % fft_len] = value.re * scale;
    }
    centered
}

/// Highest peak and its delay, plus the best value outside `exclusion`
/// samples around it.
fn find_peaks(correlation: &[f64], exclusion: usize) -> (i64, f64, f64) {
    let center = correlation.len() / 2;

    let (max_idx, max_val) = correlation
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, &v)| (i, v))
        .unwrap_or((center, 0.0));

    let secondary = correlation
        .iter()
        .enumerate()
        .filter(|(i, _)| i.abs_diff(max_idx) > exclusion)
        .map(|(_, &v)| v)
        .fold(0.0_f64, f64::max);

    // Peak at positive lag means the reference leads, so `other` is late.
    let delay = -(max_idx as i64 - center as i64);
    (delay, max_val, secondary)
}

impl FidelityCorrelator for WaveformCorrelator {
    fn name(&self) -> &str {
        "waveform"
    }

    fn correlate(&self, reference: &Path, other: &Path) -> FidelityResult<SegmentFidelity> {
        let (ref_samples, ref_rate) = self.load(reference)?;
        let (other_samples, other_rate) = self.load(other)?;

        if ref_samples.is_empty() || other_samples.is_empty() {
            return Err(FidelityError::Correlation("empty audio segment".to_string()));
        }
        if ref_rate != other_rate {
            return Err(FidelityError::Correlation(format!(
                "sample rate mismatch: {} vs {}",
                ref_rate, other_rate
            )));
        }

        let correlation = cross_correlation(&ref_samples, &other_samples);
        let exclusion = (ref_rate / 1000 * SECONDARY_EXCLUSION_MS) as usize;
        let (delay_samples, peak, secondary) = find_peaks(&correlation, exclusion);

        Ok(SegmentFidelity {
            score: peak.clamp(0.0, 1.0),
            secondary: secondary.clamp(0.0, 1.0),
            delay_samples,
        })
    }
}
