//! Tone generation and equal-temperament note frequencies.

use super::AudioBuffer;

/// Reference pitch: A4.
pub const A4_HZ: f64 = 440.0;

/// Generate a sine wave. A zero sample rate is treated as 1 Hz.
pub fn generate_sine(
    frequency_hz: f32,
    duration_secs: f32,
    sample_rate: u32,
    amplitude: f32,
) -> AudioBuffer {
    let sample_rate = sample_rate.max(1);
    let count = (duration_secs.max(0.0) * sample_rate as f32).round() as usize;
    let step = 2.0 * std::f64::consts::PI * f64::from(frequency_hz) / f64::from(sample_rate);
    let samples = (0..count)
        .map(|n| amplitude * (step * n as f64).sin() as f32)
        .collect();
    AudioBuffer {
        samples,
        sample_rate,
    }
}

/// Semitone offset of a key name from C, accepting sharps and flats.
pub fn semitone_of(key: &str) -> Option<i32> {
    let semitone = match key {
        "C" => 0,
        "C#" | "Db" => 1,
        "D" => 2,
        "D#" | "Eb" => 3,
        "E" => 4,
        "F" => 5,
        "F#" | "Gb" => 6,
        "G" => 7,
        "G#" | "Ab" => 8,
        "A" => 9,
        "A#" | "Bb" => 10,
        "B" => 11,
        _ => return None,
    };
    Some(semitone)
}

/// Frequency of `key` in `octave` (scientific pitch notation, A4 = 440 Hz).
pub fn note_frequency(key: &str, octave: i32) -> Option<f64> {
    let midi = (octave + 1) * 12 + semitone_of(key)?;
    Some(A4_HZ * 2f64.powf(f64::from(midi - 69) / 12.0))
}
