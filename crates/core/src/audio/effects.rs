//! Time-domain effects.
//!
//! Every effect preserves the input length. Effects are described by the
//! serializable [`Effect`] enum so clients can submit chains as JSON:
//!
//! ```json
//! [{ "type": "low_pass", "cutoff_hz": 800.0 }, { "type": "reverb", "wet": 0.4 }]
//! ```

use serde::{Deserialize, Serialize};

use super::{AudioBuffer, AudioError};

/// Comb filter delays (in samples at 44.1 kHz) for the reverb.
const COMB_DELAYS_44K: [usize; 4] = [1116, 1188, 1277, 1356];
/// Allpass delays (in samples at 44.1 kHz) for the reverb.
const ALLPASS_DELAYS_44K: [usize; 2] = [556, 441];
const ALLPASS_FEEDBACK: f32 = 0.5;
/// Input gain into the comb bank.
const REVERB_INPUT_GAIN: f32 = 0.03;

pub const MAX_DELAY_SECS: f32 = 5.0;
pub const MIN_DRIVE: f32 = 1.0;
pub const MAX_DRIVE: f32 = 100.0;

/// One processing step in an effect chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Damped comb-filter reverb.
    Reverb {
        #[serde(default = "default_room_size")]
        room_size: f32,
        #[serde(default = "default_damping")]
        damping: f32,
        #[serde(default = "default_wet")]
        wet: f32,
    },
    /// Feedback echo.
    Delay {
        #[serde(default = "default_delay_time")]
        time_secs: f32,
        #[serde(default = "default_feedback")]
        feedback: f32,
        #[serde(default = "default_mix")]
        mix: f32,
    },
    /// `tanh` soft clipping.
    Distortion {
        #[serde(default = "default_drive")]
        drive: f32,
        #[serde(default = "default_full_mix")]
        mix: f32,
    },
    LowPass {
        cutoff_hz: f32,
    },
    HighPass {
        cutoff_hz: f32,
    },
}

fn default_room_size() -> f32 {
    0.5
}
fn default_damping() -> f32 {
    0.5
}
fn default_wet() -> f32 {
    0.3
}
fn default_delay_time() -> f32 {
    0.25
}
fn default_feedback() -> f32 {
    0.4
}
fn default_mix() -> f32 {
    0.5
}
fn default_drive() -> f32 {
    4.0
}
fn default_full_mix() -> f32 {
    1.0
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Reverb { .. } => "reverb",
            Effect::Delay { .. } => "delay",
            Effect::Distortion { .. } => "distortion",
            Effect::LowPass { .. } => "low_pass",
            Effect::HighPass { .. } => "high_pass",
        }
    }

    /// Check parameters against their ranges for the given sample rate.
    pub fn validate(&self, sample_rate: u32) -> Result<(), AudioError> {
        match *self {
            Effect::Reverb {
                room_size,
                damping,
                wet,
            } => {
                unit_range("room_size", room_size)?;
                unit_range("damping", damping)?;
                unit_range("wet", wet)
            }
            Effect::Delay {
                time_secs,
                feedback,
                mix,
            } => {
                if !(time_secs.is_finite() && time_secs > 0.0 && time_secs <= MAX_DELAY_SECS) {
                    return Err(AudioError::InvalidParameter(format!(
                        "delay time_secs must be in (0, {MAX_DELAY_SECS}], got {time_secs}"
                    )));
                }
                if !(feedback.is_finite() && (0.0..1.0).contains(&feedback)) {
                    return Err(AudioError::InvalidParameter(format!(
                        "delay feedback must be in [0, 1), got {feedback}"
                    )));
                }
                unit_range("mix", mix)
            }
            Effect::Distortion { drive, mix } => {
                if !(drive.is_finite() && (MIN_DRIVE..=MAX_DRIVE).contains(&drive)) {
                    return Err(AudioError::InvalidParameter(format!(
                        "distortion drive must be in [{MIN_DRIVE}, {MAX_DRIVE}], got {drive}"
                    )));
                }
                unit_range("mix", mix)
            }
            Effect::LowPass { cutoff_hz } | Effect::HighPass { cutoff_hz } => {
                let nyquist = sample_rate as f32 / 2.0;
                if !(cutoff_hz.is_finite() && cutoff_hz > 0.0 && cutoff_hz < nyquist) {
                    return Err(AudioError::InvalidParameter(format!(
                        "{} cutoff_hz must be in (0, {nyquist}), got {cutoff_hz}",
                        self.name()
                    )));
                }
                Ok(())
            }
        }
    }

    /// Apply to `samples`. Parameters are assumed valid (see [`Effect::validate`]).
    pub fn apply(&self, samples: &[f32], sample_rate: u32) -> Vec<f32> {
        match *self {
            Effect::Reverb {
                room_size,
                damping,
                wet,
            } => reverb(samples, sample_rate, room_size, damping, wet),
            Effect::Delay {
                time_secs,
                feedback,
                mix,
            } => delay(samples, sample_rate, time_secs, feedback, mix),
            Effect::Distortion { drive, mix } => distortion(samples, drive, mix),
            Effect::LowPass { cutoff_hz } => {
                Biquad::low_pass(sample_rate, cutoff_hz).process(samples)
            }
            Effect::HighPass { cutoff_hz } => {
                Biquad::high_pass(sample_rate, cutoff_hz).process(samples)
            }
        }
    }
}

/// Validate the whole chain, then apply it in order.
pub fn apply_effects(buffer: &AudioBuffer, effects: &[Effect]) -> Result<AudioBuffer, AudioError> {
    for effect in effects {
        effect.validate(buffer.sample_rate)?;
    }
    let mut samples = buffer.samples.clone();
    for effect in effects {
        samples = effect.apply(&samples, buffer.sample_rate);
    }
    Ok(AudioBuffer {
        samples,
        sample_rate: buffer.sample_rate,
    })
}

fn unit_range(field: &str, value: f32) -> Result<(), AudioError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AudioError::InvalidParameter(format!(
            "{field} must be in [0, 1], got {value}"
        )))
    }
}

fn scaled_delay(delay_44k: usize, sample_rate: u32) -> usize {
    let scaled = delay_44k as f64 * f64::from(sample_rate) / 44_100.0;
    (scaled.round() as usize).max(1)
}

// ---------------------------------------------------------------------------
// Reverb
// ---------------------------------------------------------------------------

struct Comb {
    buffer: Vec<f32>,
    index: usize,
    filter_store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            index: 0,
            filter_store: 0.0,
        }
    }

    fn tick(&mut self, input: f32, feedback: f32, damping: f32) -> f32 {
        let out = self.buffer[self.index];
        self.filter_store = out * (1.0 - damping) + self.filter_store * damping;
        self.buffer[self.index] = input + self.filter_store * feedback;
        self.index = (self.index + 1) % self.buffer.len();
        out
    }
}

struct Allpass {
    buffer: Vec<f32>,
    index: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            index: 0,
        }
    }

    fn tick(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        let out = buffered - input;
        self.buffer[self.index] = input + buffered * ALLPASS_FEEDBACK;
        self.index = (self.index + 1) % self.buffer.len();
        out
    }
}

fn reverb(samples: &[f32], sample_rate: u32, room_size: f32, damping: f32, wet: f32) -> Vec<f32> {
    let feedback = 0.7 + 0.28 * room_size;
    let mut combs: Vec<Comb> = COMB_DELAYS_44K
        .iter()
        .map(|&d| Comb::new(scaled_delay(d, sample_rate)))
        .collect();
    let mut allpasses: Vec<Allpass> = ALLPASS_DELAYS_44K
        .iter()
        .map(|&d| Allpass::new(scaled_delay(d, sample_rate)))
        .collect();

    samples
        .iter()
        .map(|&x| {
            let input = x * REVERB_INPUT_GAIN;
            let mut acc: f32 = combs
                .iter_mut()
                .map(|c| c.tick(input, feedback, damping))
                .sum();
            for ap in &mut allpasses {
                acc = ap.tick(acc);
            }
            (1.0 - wet) * x + wet * acc
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

fn delay(samples: &[f32], sample_rate: u32, time_secs: f32, feedback: f32, mix: f32) -> Vec<f32> {
    let d = ((f64::from(time_secs) * f64::from(sample_rate)).round() as usize).max(1);
    let mut echo = vec![0.0f32; samples.len()];
    for n in d..samples.len() {
        echo[n] = samples[n - d] + feedback * echo[n - d];
    }
    samples
        .iter()
        .zip(&echo)
        .map(|(&dry, &wet)| (1.0 - mix) * dry + mix * wet)
        .collect()
}

// ---------------------------------------------------------------------------
// Distortion
// ---------------------------------------------------------------------------

fn distortion(samples: &[f32], drive: f32, mix: f32) -> Vec<f32> {
    let norm = drive.tanh();
    samples
        .iter()
        .map(|&x| {
            let shaped = (drive * x).tanh() / norm;
            (1.0 - mix) * x + mix * shaped
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Biquad filters (RBJ cookbook, Butterworth Q)
// ---------------------------------------------------------------------------

struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn coefficients(sample_rate: u32, cutoff_hz: f32) -> (f64, f64) {
        let w0 = 2.0 * std::f64::consts::PI * f64::from(cutoff_hz) / f64::from(sample_rate);
        let alpha = w0.sin() / (2.0 * std::f64::consts::FRAC_1_SQRT_2);
        (w0.cos(), alpha)
    }

    fn low_pass(sample_rate: u32, cutoff_hz: f32) -> Self {
        let (cos, alpha) = Self::coefficients(sample_rate, cutoff_hz);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos) / 2.0 / a0,
            b1: (1.0 - cos) / a0,
            b2: (1.0 - cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn high_pass(sample_rate: u32, cutoff_hz: f32) -> Self {
        let (cos, alpha) = Self::coefficients(sample_rate, cutoff_hz);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos) / 2.0 / a0,
            b1: -(1.0 + cos) / a0,
            b2: (1.0 + cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn process(&self, samples: &[f32]) -> Vec<f32> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        samples
            .iter()
            .map(|&s| {
                let x = f64::from(s);
                let y = self.b0 * x + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
                x2 = x1;
                x1 = x;
                y2 = y1;
                y1 = y;
                y as f32
            })
            .collect()
    }
}
