//! Audio file I/O for refmatch
//!
//! Handles importing and exporting WAV files. Imported audio is converted
//! to 32-bit float stereo at the requested processing rate.
//! Sample rate conversion uses linear interpolation.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{debug, warn};

use crate::config::OutputSubtype;
use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{MatchError, Result};

/// Import a WAV file as a stereo buffer at `sample_rate`
///
/// Mono files are upmixed by duplicating the channel; files at another rate
/// are resampled.
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a valid WAV file or is empty
/// * `UnsupportedFormat` - If the audio has more than 2 channels
pub fn import_audio(path: &Path, sample_rate: u32) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(MatchError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| MatchError::InvalidAudio {
        reason: format!("Failed to open WAV file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    debug!(
        "Loading '{}': {} ch, {} Hz, {}-bit {:?}",
        path.display(),
        channels,
        spec.sample_rate,
        spec.bits_per_sample,
        spec.sample_format
    );

    let layout = ChannelLayout::from_count(channels).ok_or_else(|| {
        MatchError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        }
    })?;

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if interleaved.is_empty() {
        return Err(MatchError::InvalidAudio {
            reason: format!("'{}' contains no samples", path.display()),
            source: None,
        });
    }

    let mut buffer = AudioBuffer::from_interleaved(&interleaved, layout, spec.sample_rate)?;

    if layout == ChannelLayout::Mono {
        warn!("'{}' is mono, duplicating it to stereo", path.display());
        buffer = buffer.to_stereo();
    }

    if spec.sample_rate != sample_rate {
        warn!(
            "'{}' is {} Hz, resampling to {} Hz",
            path.display(),
            spec.sample_rate,
            sample_rate
        );
        buffer = resample(&buffer, sample_rate)?;
    }

    Ok(buffer)
}

/// Export an AudioBuffer to a WAV file with the given encoding
///
/// The buffer is written at its own sample rate; no conversion happens.
pub fn export_audio(buffer: &AudioBuffer, path: &Path, subtype: OutputSubtype) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: subtype.bits_per_sample(),
        sample_format: match subtype {
            OutputSubtype::Float32 => SampleFormat::Float,
            OutputSubtype::Pcm16 | OutputSubtype::Pcm24 => SampleFormat::Int,
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(hound_to_io)?;

    let interleaved = buffer.to_interleaved();
    match subtype {
        OutputSubtype::Pcm16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        OutputSubtype::Pcm24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).round().clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        OutputSubtype::Float32 => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(hound_to_io)?;
            }
        }
    }

    writer.finalize().map_err(hound_to_io)?;
    debug!("Wrote '{}' ({:?})", path.display(), subtype);

    Ok(())
}

/// Generate a stereo test tone with different frequencies per channel
///
/// Useful for exercising the pipeline without fixture files.
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let tone = |freq: f32| -> Vec<f32> {
        let angular_freq = 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
        (0..num_samples)
            .map(|i| amplitude * (angular_freq * i as f32).sin())
            .collect()
    };
    AudioBuffer::from_planar(vec![tone(freq_left), tone(freq_right)], sample_rate)
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn hound_to_io(e: hound::Error) -> MatchError {
    match e {
        hound::Error::IoError(io) => MatchError::Io(io),
        other => MatchError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let invalid = |bits: u16| {
        move |e: hound::Error| MatchError::InvalidAudio {
            reason: format!("Failed to read {}-bit samples: {}", bits, e),
            source: Some(Box::new(e)),
        }
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid(bits_per_sample)),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                _ => {
                    return Err(MatchError::UnsupportedFormat {
                        format: format!("{}-bit integer audio", bits_per_sample),
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / scale) as f32))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(invalid(bits_per_sample))
        }
    }
}

/// Resample every channel to `target_rate` by linear interpolation
fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    let ratio = target_rate as f64 / buffer.sample_rate() as f64;
    let left = resample_linear(buffer.channel(0), ratio);
    let right = resample_linear(buffer.channel(1), ratio);
    AudioBuffer::from_channels(left, right, target_rate)
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;

    (0..target_len)
        .map(|i| {
            // Map output index to source position
            let src_pos = i as f64 / ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = (src_pos - src_idx as f64) as f32;

            if src_idx + 1 < source_len {
                samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
            } else if src_idx < source_len {
                samples[src_idx]
            } else {
                0.0
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
