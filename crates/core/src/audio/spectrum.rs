//! Short-time Fourier transform and frequency analysis.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::Serialize;

use super::AudioBuffer;

/// Average magnitudes at or below this level are treated as silence.
const SILENCE_THRESHOLD: f32 = 1e-6;

/// Result of [`frequency_from_spectrum`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyAnalysis {
    /// Dominant frequency, refined by parabolic interpolation. `None` for silence.
    pub peak_frequency_hz: Option<f64>,
    /// Magnitude-weighted mean frequency. `None` for silence.
    pub spectral_centroid_hz: Option<f64>,
    pub rms: f64,
    pub duration_secs: f64,
    pub sample_rate: u32,
}

/// Periodic Hann window of `size` points.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| {
            let phase = 2.0 * std::f32::consts::PI * n as f32 / size as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}

/// Number of centered frames produced for `len` samples. Always at least one.
pub fn frame_count(len: usize, frame_size: usize, hop_size: usize) -> usize {
    let padded_len = len + 2 * (frame_size / 2);
    if padded_len <= frame_size {
        1
    } else {
        1 + (padded_len - frame_size) / hop_size
    }
}

/// Streaming magnitude STFT with centered frames.
///
/// The signal is read as if padded with `frame_size / 2` zeros on both sides,
/// so frame `i` is centered on sample `i * hop_size`. Frames are handed to
/// the caller one at a time from a single reused buffer of
/// `frame_size / 2 + 1` magnitude bins; nothing is retained between frames.
pub struct Stft {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    frame_size: usize,
    hop_size: usize,
}

impl Stft {
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(frame_size);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            window: hann_window(frame_size),
            buffer: vec![Complex::default(); frame_size],
            scratch,
            magnitudes: vec![0.0; frame_size / 2 + 1],
            frame_size,
            hop_size,
        }
    }

    /// Magnitude bins per frame.
    pub fn bins(&self) -> usize {
        self.magnitudes.len()
    }

    /// Transform `samples`, calling `visit` with each frame's magnitudes in
    /// order. Returns the number of frames visited.
    pub fn for_each_frame(&mut self, samples: &[f32], mut visit: impl FnMut(&[f32])) -> usize {
        let pad = self.frame_size / 2;
        let count = frame_count(samples.len(), self.frame_size, self.hop_size);

        for frame in 0..count {
            let start = frame * self.hop_size;
            for (n, slot) in self.buffer.iter_mut().enumerate() {
                let sample = (start + n)
                    .checked_sub(pad)
                    .and_then(|i| samples.get(i))
                    .copied()
                    .unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[n], 0.0);
            }
            self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
            for (m, c) in self.magnitudes.iter_mut().zip(&self.buffer) {
                *m = c.norm();
            }
            visit(&self.magnitudes);
        }
        count
    }
}

/// Running mean magnitude per bin.
#[derive(Debug, Clone)]
pub struct SpectrumAverage {
    sums: Vec<f64>,
    frames: usize,
}

impl SpectrumAverage {
    pub fn new(bins: usize) -> Self {
        Self {
            sums: vec![0.0; bins],
            frames: 0,
        }
    }

    pub fn add(&mut self, magnitudes: &[f32]) {
        for (acc, &m) in self.sums.iter_mut().zip(magnitudes) {
            *acc += f64::from(m);
        }
        self.frames += 1;
    }

    /// Mean per bin; all zeros before any frame is added.
    pub fn mean(&self) -> Vec<f32> {
        let count = self.frames.max(1) as f64;
        self.sums.iter().map(|&sum| (sum / count) as f32).collect()
    }
}

/// Index of the strongest bin (excluding DC and Nyquist) refined by
/// quadratic interpolation over its neighbours, in fractional bins.
pub fn interpolated_peak_bin(spectrum: &[f32]) -> Option<f64> {
    if spectrum.len() < 3 {
        return None;
    }
    let (k, &peak) = spectrum[1..spectrum.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, m)| (i + 1, m))
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if peak <= SILENCE_THRESHOLD {
        return None;
    }

    let a = f64::from(spectrum[k - 1]);
    let b = f64::from(peak);
    let c = f64::from(spectrum[k + 1]);
    let denom = a - 2.0 * b + c;
    let offset = if denom.abs() > f64::EPSILON {
        (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };
    Some(k as f64 + offset)
}

/// Frequency statistics of `buffer` from its average magnitude spectrum.
pub fn frequency_from_spectrum(
    spectrum: &[f32],
    buffer: &AudioBuffer,
    frame_size: usize,
) -> FrequencyAnalysis {
    let bin_hz = f64::from(buffer.sample_rate) / frame_size as f64;

    let peak_frequency_hz = interpolated_peak_bin(spectrum).map(|bin| bin * bin_hz);

    let total: f64 = spectrum.iter().map(|&m| f64::from(m)).sum();
    let spectral_centroid_hz = if total > f64::from(SILENCE_THRESHOLD) {
        let weighted: f64 = spectrum
            .iter()
            .enumerate()
            .map(|(k, &m)| k as f64 * bin_hz * f64::from(m))
            .sum();
        Some(weighted / total)
    } else {
        None
    };

    FrequencyAnalysis {
        peak_frequency_hz,
        spectral_centroid_hz,
        rms: buffer.rms(),
        duration_secs: buffer.duration_secs(),
        sample_rate: buffer.sample_rate,
    }
}

/// Frequency analysis alone, streaming the STFT into a running average.
pub fn analyze_frequency(
    buffer: &AudioBuffer,
    frame_size: usize,
    hop_size: usize,
) -> FrequencyAnalysis {
    let mut stft = Stft::new(frame_size, hop_size);
    let mut average = SpectrumAverage::new(stft.bins());
    stft.for_each_frame(&buffer.samples, |magnitudes| average.add(magnitudes));
    frequency_from_spectrum(&average.mean(), buffer, frame_size)
}
