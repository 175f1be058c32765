//! WAV decoding and encoding.
//!
//! Decoding accepts integer PCM of any bit depth up to 32 and 32-bit float,
//! averaging interleaved channels down to mono. Encoding always writes 16-bit
//! mono PCM, clamping samples to `[-1.0, 1.0]` first.

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{AudioBuffer, AudioError};

/// Bit depth used for every written file.
pub const OUTPUT_BITS_PER_SAMPLE: u16 = 16;

/// Decode a WAV stream into a mono buffer.
pub fn decode_wav<R: Read>(reader: R) -> Result<AudioBuffer, AudioError> {
    read_mono(WavReader::new(reader)?)
}

/// Load and decode a WAV file from disk.
pub fn load_wav(path: impl AsRef<Path>) -> Result<AudioBuffer, AudioError> {
    read_mono(WavReader::open(path)?)
}

/// Encode a buffer as an in-memory 16-bit mono WAV file.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>, AudioError> {
    let mut cursor = Cursor::new(Vec::new());
    write_to(&mut cursor, buffer)?;
    Ok(cursor.into_inner())
}

/// Write a buffer to disk as a 16-bit mono WAV file.
pub fn save_wav(path: impl AsRef<Path>, buffer: &AudioBuffer) -> Result<(), AudioError> {
    let file = std::fs::File::create(path)?;
    write_to(std::io::BufWriter::new(file), buffer)
}

fn write_to<W: Write + Seek>(out: W, buffer: &AudioBuffer) -> Result<(), AudioError> {
    let mut writer = WavWriter::new(out, output_spec(buffer.sample_rate))?;
    for &s in &buffer.samples {
        writer.write_sample(quantize(s))?;
    }
    writer.finalize()?;
    Ok(())
}

fn output_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: OUTPUT_BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

fn read_mono<R: Read>(mut reader: WavReader<R>) -> Result<AudioBuffer, AudioError> {
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::UnsupportedFormat("zero channels".to_string()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{}-bit float samples",
                    spec.bits_per_sample
                )));
            }
            reader.samples::<f32>().collect::<Result<_, _>>()?
        }
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{}-bit integer samples",
                    spec.bits_per_sample
                )));
            }
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()?
        }
    };

    if interleaved.is_empty() {
        return Err(AudioError::EmptyInput);
    }

    let channels = usize::from(spec.channels);
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    AudioBuffer::new(samples, spec.sample_rate)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn encode_then_decode_preserves_rate_and_length() {
        let buf = AudioBuffer::new(vec![0.0, 0.5, -0.5, 1.0, -1.0], 16000).unwrap();
        let bytes = encode_wav(&buf).unwrap();
        let decoded = decode_wav(Cursor::new(bytes)).unwrap();

        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.len(), 5);
        for (a, b) in buf.samples.iter().zip(&decoded.samples) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let buf = AudioBuffer::new(vec![3.0, -3.0], 8000).unwrap();
        let decoded = decode_wav(Cursor::new(encode_wav(&buf).unwrap())).unwrap();
        assert!(decoded.samples[0] <= 1.0 && decoded.samples[0] > 0.99);
        assert!(decoded.samples[1] >= -1.0 && decoded.samples[1] < -0.99);
    }

    #[test]
    fn stereo_is_mixed_down_to_mono() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..4 {
                writer.write_sample(i16::MAX).unwrap();
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let decoded = decode_wav(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(decoded.len(), 4);
        assert!(decoded.samples.iter().all(|s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn float_wav_is_read() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0.25f32).unwrap();
            writer.write_sample(-0.75f32).unwrap();
            writer.finalize().unwrap();
        }

        let decoded = decode_wav(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(decoded.samples, vec![0.25, -0.75]);
        assert_eq!(decoded.sample_rate, 48000);
    }

    #[test]
    fn empty_wav_is_rejected() {
        let buf = AudioBuffer::new(Vec::new(), 8000).unwrap();
        let bytes = encode_wav(&buf).unwrap();
        assert_matches!(decode_wav(Cursor::new(bytes)), Err(AudioError::EmptyInput));
    }

    #[test]
    fn garbage_is_rejected() {
        let result = decode_wav(Cursor::new(b"definitely not a wav file".to_vec()));
        assert_matches!(result, Err(AudioError::Wav(_)));
    }

    #[test]
    fn save_and_load_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let buf = super::super::synth::generate_sine(330.0, 0.05, 8000, 0.5);

        save_wav(&path, &buf).unwrap();
        let loaded = load_wav(&path).unwrap();

        assert_eq!(loaded.len(), buf.len());
        assert_eq!(loaded.sample_rate, 8000);
    }
}
