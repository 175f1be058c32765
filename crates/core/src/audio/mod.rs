//! Audio processing toolkit.
//!
//! Everything operates on a mono [`AudioBuffer`] of `f32` samples nominally in
//! `[-1.0, 1.0]`:
//!
//! - [`io`] -- WAV decode/encode (any channel count is mixed down to mono).
//! - [`spectrum`] -- streaming STFT and frequency analysis.
//! - [`effects`] -- reverb, delay, distortion and biquad filters.
//! - [`onset`] -- spectral-flux onset detection and tempo estimation.
//! - [`synth`] -- sine generation and note-to-frequency mapping.
//!
//! [`AudioProcessor`] ties these together behind one configured entry point.

pub mod effects;
pub mod io;
pub mod onset;
pub mod spectrum;
pub mod synth;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub use effects::{apply_effects, Effect};
pub use io::{decode_wav, encode_wav, load_wav, save_wav};
pub use spectrum::FrequencyAnalysis;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default STFT frame size in samples.
pub const DEFAULT_FRAME_SIZE: usize = 2048;

/// Default STFT hop size in samples.
pub const DEFAULT_HOP_SIZE: usize = 512;

/// Smallest accepted STFT frame size.
pub const MIN_FRAME_SIZE: usize = 64;

/// Maximum number of effects accepted in one chain.
pub const MAX_EFFECT_CHAIN_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio contains no samples")]
    EmptyInput,

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<AudioError> for CoreError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Io(e) => CoreError::Internal(format!("audio I/O failed: {e}")),
            other => CoreError::Validation(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// Mono audio samples with their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::UnsupportedFormat(
                "sample rate must be positive".to_string(),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root-mean-square level.
    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
        (sum / self.samples.len() as f64).sqrt()
    }

    /// Scale so the peak absolute value equals `target_peak`.
    ///
    /// Silent buffers are left unchanged.
    pub fn normalize(&mut self, target_peak: f32) {
        let peak = self.peak();
        if peak <= f32::EPSILON {
            return;
        }
        let gain = target_peak / peak;
        for s in &mut self.samples {
            *s *= gain;
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for spectral analysis and onset detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub frame_size: usize,
    pub hop_size: usize,
    /// Threshold above the local mean (on a 0..1 envelope) for an onset peak.
    pub onset_delta: f32,
    /// Minimum time between reported onsets.
    pub onset_wait_secs: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
            onset_delta: 0.07,
            onset_wait_secs: 0.03,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.frame_size < MIN_FRAME_SIZE {
            return Err(AudioError::InvalidParameter(format!(
                "frame_size must be >= {MIN_FRAME_SIZE}, got {}",
                self.frame_size
            )));
        }
        if self.hop_size == 0 || self.hop_size > self.frame_size {
            return Err(AudioError::InvalidParameter(format!(
                "hop_size must be in 1..={}, got {}",
                self.frame_size, self.hop_size
            )));
        }
        if !(self.onset_delta.is_finite() && self.onset_delta >= 0.0) {
            return Err(AudioError::InvalidParameter(
                "onset_delta must be a non-negative number".to_string(),
            ));
        }
        if !(self.onset_wait_secs.is_finite() && self.onset_wait_secs >= 0.0) {
            return Err(AudioError::InvalidParameter(
                "onset_wait_secs must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Full analysis of one buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioAnalysis {
    #[serde(flatten)]
    pub frequency: FrequencyAnalysis,
    pub onsets_secs: Vec<f64>,
    pub tempo_bpm: Option<f64>,
}

/// Configured entry point for analysis and effect processing.
#[derive(Debug, Clone)]
pub struct AudioProcessor {
    config: AnalysisConfig,
}

impl AudioProcessor {
    pub fn new(config: AnalysisConfig) -> Result<Self, AudioError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Frequency analysis, onsets and tempo from a single streaming STFT
    /// pass. Memory beyond the buffer itself is one frame of bins plus one
    /// envelope value per frame.
    pub fn analyze(&self, buffer: &AudioBuffer) -> Result<AudioAnalysis, AudioError> {
        if buffer.is_empty() {
            return Err(AudioError::EmptyInput);
        }
        let mut stft = spectrum::Stft::new(self.config.frame_size, self.config.hop_size);
        let mut average = spectrum::SpectrumAverage::new(stft.bins());
        let mut onsets = onset::OnsetEnvelope::new();
        stft.for_each_frame(&buffer.samples, |magnitudes| {
            average.add(magnitudes);
            onsets.push(magnitudes);
        });

        let frequency =
            spectrum::frequency_from_spectrum(&average.mean(), buffer, self.config.frame_size);
        let envelope = onsets.finish();
        let wait_frames = onset::secs_to_frames(
            self.config.onset_wait_secs,
            buffer.sample_rate,
            self.config.hop_size,
        );
        let onsets_secs = onset::pick_peaks(&envelope, self.config.onset_delta, wait_frames)
            .into_iter()
            .map(|frame| onset::frame_to_secs(frame, buffer.sample_rate, self.config.hop_size))
            .collect();
        let tempo_bpm =
            onset::estimate_tempo(&envelope, buffer.sample_rate, self.config.hop_size);

        Ok(AudioAnalysis {
            frequency,
            onsets_secs,
            tempo_bpm,
        })
    }

    /// Apply an effect chain, then optionally normalize to `normalize_peak`.
    pub fn process(
        &self,
        buffer: &AudioBuffer,
        effects: &[Effect],
        normalize_peak: Option<f32>,
    ) -> Result<AudioBuffer, AudioError> {
        if effects.len() > MAX_EFFECT_CHAIN_LEN {
            return Err(AudioError::InvalidParameter(format!(
                "at most {MAX_EFFECT_CHAIN_LEN} effects may be chained, got {}",
                effects.len()
            )));
        }
        if let Some(peak) = normalize_peak {
            if !(peak > 0.0 && peak <= 1.0) {
                return Err(AudioError::InvalidParameter(format!(
                    "normalize peak must be in (0, 1], got {peak}"
                )));
            }
        }
        let mut out = apply_effects(buffer, effects)?;
        if let Some(peak) = normalize_peak {
            out.normalize(peak);
        }
        Ok(out)
    }
}

impl Default for AudioProcessor {
    fn default() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
