//! Spectral-flux onset detection and tempo estimation.

/// Frames on each side a peak must dominate.
const PEAK_RADIUS: usize = 3;
/// Frames on each side used for the local mean threshold.
const MEAN_RADIUS: usize = 10;

pub const MIN_TEMPO_BPM: f64 = 60.0;
pub const MAX_TEMPO_BPM: f64 = 200.0;
/// Centre of the tempo prior (BPM) and its spread in octaves.
const TEMPO_PRIOR_BPM: f64 = 120.0;
const TEMPO_PRIOR_OCTAVES: f64 = 1.0;

/// Onset strength envelope built one STFT frame at a time.
///
/// Each value is the sum over bins of the positive increase in
/// log-compressed magnitude relative to the previous frame. Only the
/// previous frame is kept. The first frame has no predecessor and is always
/// zero.
#[derive(Debug, Default)]
pub struct OnsetEnvelope {
    previous: Vec<f32>,
    envelope: Vec<f32>,
}

impl OnsetEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, magnitudes: &[f32]) {
        let flux = if self.previous.is_empty() {
            0.0
        } else {
            magnitudes
                .iter()
                .zip(&self.previous)
                .map(|(&cur, &prev)| (cur.ln_1p() - prev).max(0.0))
                .sum()
        };
        self.envelope.push(flux);
        self.previous.clear();
        self.previous.extend(magnitudes.iter().map(|m| m.ln_1p()));
    }

    /// Envelope normalised to peak 1.0; a flat envelope stays all zero.
    pub fn finish(self) -> Vec<f32> {
        let mut envelope = self.envelope;
        let peak = envelope.iter().copied().fold(0.0f32, f32::max);
        if peak > 0.0 {
            for v in &mut envelope {
                *v /= peak;
            }
        }
        envelope
    }
}

/// Frame indices of onset peaks.
///
/// A frame is an onset when it is the maximum within +/-[`PEAK_RADIUS`]
/// frames, exceeds the mean over +/-[`MEAN_RADIUS`] frames by `delta`, and
/// lies at least `wait` frames after the previous onset.
pub fn pick_peaks(envelope: &[f32], delta: f32, wait: usize) -> Vec<usize> {
    let n = envelope.len();
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for i in 0..n {
        let value = envelope[i];
        if value <= 0.0 {
            continue;
        }

        let window = &envelope[i.saturating_sub(PEAK_RADIUS)..(i + PEAK_RADIUS + 1).min(n)];
        if window.iter().any(|&v| v > value) {
            continue;
        }

        let around = &envelope[i.saturating_sub(MEAN_RADIUS)..(i + MEAN_RADIUS + 1).min(n)];
        let mean = around.iter().sum::<f32>() / around.len() as f32;
        if value < mean + delta {
            continue;
        }

        if let Some(prev) = last {
            if i - prev < wait.max(1) {
                continue;
            }
        }
        peaks.push(i);
        last = Some(i);
    }
    peaks
}

/// Estimate tempo from an onset envelope by autocorrelation.
///
/// Lags between [`MIN_TEMPO_BPM`] and [`MAX_TEMPO_BPM`] are scored by their
/// overlap-normalised autocorrelation, weighted by a log-normal prior around
/// 120 BPM so a period and its double do not tie. Returns `None` for flat or
/// too-short envelopes.
pub fn estimate_tempo(envelope: &[f32], sample_rate: u32, hop_size: usize) -> Option<f64> {
    let frames_per_minute = 60.0 * f64::from(sample_rate) / hop_size as f64;
    let min_lag = (frames_per_minute / MAX_TEMPO_BPM).ceil().max(1.0) as usize;
    let max_lag = (frames_per_minute / MIN_TEMPO_BPM).floor() as usize;
    if max_lag < min_lag || envelope.len() < 2 * max_lag {
        return None;
    }

    let smoothed = smooth(envelope);
    let mean = smoothed.iter().sum::<f32>() / smoothed.len() as f32;
    let centered: Vec<f64> = smoothed.iter().map(|&v| f64::from(v - mean)).collect();
    if centered.iter().all(|v| v.abs() < 1e-9) {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for lag in min_lag..=max_lag {
        let overlap = centered.len() - lag;
        let corr: f64 = (0..overlap).map(|i| centered[i] * centered[i + lag]).sum::<f64>()
            / overlap as f64;
        let bpm = frames_per_minute / lag as f64;
        let prior = (-0.5 * ((bpm / TEMPO_PRIOR_BPM).log2() / TEMPO_PRIOR_OCTAVES).powi(2)).exp();
        let score = corr * prior;
        let better = match best {
            None => true,
            Some((_, best_score)) => score > best_score,
        };
        if better {
            best = Some((lag, score));
        }
    }

    match best {
        Some((lag, score)) if score > 0.0 => Some(frames_per_minute / lag as f64),
        _ => None,
    }
}

/// Frame index to seconds (frames are centered on `frame * hop_size`).
pub fn frame_to_secs(frame: usize, sample_rate: u32, hop_size: usize) -> f64 {
    (frame * hop_size) as f64 / f64::from(sample_rate)
}

/// Seconds to a whole number of frames, rounded to nearest.
pub fn secs_to_frames(secs: f64, sample_rate: u32, hop_size: usize) -> usize {
    (secs * f64::from(sample_rate) / hop_size as f64).round() as usize
}

/// Triangular smoothing over five frames.
fn smooth(envelope: &[f32]) -> Vec<f32> {
    const KERNEL: [f32; 5] = [1.0, 2.0, 3.0, 2.0, 1.0];
    const KERNEL_SUM: f32 = 9.0;
    let n = envelope.len();
    (0..n)
        .map(|i| {
            KERNEL
                .iter()
                .enumerate()
                .filter_map(|(k, w)| {
                    (i + k)
                        .checked_sub(2)
                        .and_then(|j| envelope.get(j))
                        .map(|v| v * w)
                })
                .sum::<f32>()
                / KERNEL_SUM
        })
        .collect()
}
