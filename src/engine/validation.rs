//! Input validation
//!
//! Checks every precondition the matching core relies on before any
//! processing starts: sample rate, channel count, length, and that target
//! and reference are not the same recording.

use tracing::{info, warn};

use crate::config::Config;
use crate::engine::buffer::AudioBuffer;
use crate::error::{MatchError, Result};

/// Peak condition of an input, derived from how often its peak repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakCondition {
    /// Peak value is rare
    Clean,
    /// Peak value repeats often enough to suggest hard clipping
    Clipped,
    /// Peak value repeats so often the input has likely been limited
    Limited,
}

/// Result of scanning an input for repeated peak samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakInspection {
    /// Absolute peak across both channels
    pub peak: f32,
    /// Number of samples whose magnitude equals the peak
    pub samples_at_peak: usize,
    /// Classification against the configured thresholds
    pub condition: PeakCondition,
}

/// Validate one input buffer against the configuration
///
/// # Errors
/// `SampleRateMismatch`, `ChannelCount`, `TooShort` or `TooLong`
pub fn validate_input(buffer: &AudioBuffer, which: &'static str, config: &Config) -> Result<()> {
    if buffer.sample_rate() != config.internal_sample_rate {
        return Err(MatchError::SampleRateMismatch {
            which,
            found: buffer.sample_rate(),
            expected: config.internal_sample_rate,
        });
    }

    if buffer.channels() != 2 {
        return Err(MatchError::ChannelCount {
            which,
            found: buffer.channels(),
        });
    }

    if buffer.len() <= config.fft_size {
        return Err(MatchError::TooShort {
            which,
            length: buffer.len(),
            fft_size: config.fft_size,
        });
    }

    let duration_secs = buffer.duration_secs();
    if duration_secs > config.max_length_secs {
        return Err(MatchError::TooLong {
            which,
            duration_secs,
            max_secs: config.max_length_secs,
        });
    }

    Ok(())
}

/// Reject byte-identical target and reference
///
/// # Errors
/// `IdenticalInputs` when both buffers hash to the same digest
pub fn check_equality(target: &AudioBuffer, reference: &AudioBuffer) -> Result<()> {
    if target.len() == reference.len() && target.content_digest() == reference.content_digest() {
        return Err(MatchError::IdenticalInputs);
    }
    Ok(())
}

/// Count repeated peak samples and classify the input
pub fn inspect_peaks(buffer: &AudioBuffer, config: &Config) -> PeakInspection {
    let peak = buffer.peak();
    let samples_at_peak = if peak > 0.0 {
        (0..buffer.channels())
            .flat_map(|ch| buffer.channel(ch).iter())
            .filter(|s| s.abs() == peak)
            .count()
    } else {
        0
    };

    let condition = if samples_at_peak > config.limited_samples_threshold {
        PeakCondition::Limited
    } else if samples_at_peak > config.clipping_samples_threshold {
        PeakCondition::Clipped
    } else {
        PeakCondition::Clean
    };

    PeakInspection {
        peak,
        samples_at_peak,
        condition,
    }
}

/// Log what the peak inspection suggests about an input
pub fn report_peaks(buffer: &AudioBuffer, which: &'static str, config: &Config) -> PeakInspection {
    let inspection = inspect_peaks(buffer, config);
    match inspection.condition {
        PeakCondition::Clean => {}
        PeakCondition::Clipped => warn!(
            "The {} may be clipped: {} samples sit at the peak of {:.4}",
            which, inspection.samples_at_peak, inspection.peak
        ),
        PeakCondition::Limited if which == "target" => warn!(
            "The target looks already limited or mastered ({} samples at peak); \
             results may sound over-compressed",
            inspection.samples_at_peak
        ),
        PeakCondition::Limited => info!(
            "The {} is limited ({} samples at peak)",
            which, inspection.samples_at_peak
        ),
    }
    inspection
}
