//! Audio Buffer Management
//!
//! Provides the core audio buffer type shared by every stage of the
//! matching pipeline. Buffers are immutable once built: every transform
//! returns a new buffer.

use sha2::{Digest, Sha256};

use crate::error::{MatchError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default internal processing rate (44.1kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
///
/// # Arguments
/// * `db` - Value in decibels
///
/// # Returns
/// Linear amplitude (0.0 to 1.0+ range)
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// # Returns
/// Value in decibels. Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Root mean square of a slice, accumulated in f64
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Maximum absolute value of a slice
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Planar 32-bit float audio paired with its sample rate
///
/// The matching core only ever sees stereo buffers; mono buffers exist at
/// the loader boundary and are upmixed with [`AudioBuffer::to_stereo`].
///
/// # Example
/// ```
/// use refmatch::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::from_channels(vec![0.5; 100], vec![-0.5; 100], 44100).unwrap();
/// let (mid, side) = buffer.to_mid_side();
/// assert_eq!(mid[0], 0.0);
/// assert_eq!(side[0], 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer with the specified number of samples and layout
    pub fn silence(num_samples: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; layout.num_channels()],
            sample_rate,
        }
    }

    /// Create a stereo buffer from separate left and right channels
    ///
    /// # Errors
    /// `InvalidAudio` if the channels differ in length
    pub fn from_channels(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if left.len() != right.len() {
            return Err(MatchError::InvalidAudio {
                reason: format!(
                    "Channel lengths differ: left {} vs right {}",
                    left.len(),
                    right.len()
                ),
                source: None,
            });
        }
        Ok(Self {
            samples: vec![left, right],
            sample_rate,
        })
    }

    /// Build from planar channels whose lengths the caller already guarantees
    pub(crate) fn from_planar(samples: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(samples.windows(2).all(|w| w[0].len() == w[1].len()));
        Self {
            samples,
            sample_rate,
        }
    }

    /// Create a mono buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: vec![samples],
            sample_rate,
        }
    }

    /// Rebuild a stereo buffer from mid and side signals
    ///
    /// Inverse of [`AudioBuffer::to_mid_side`]: L = M + S, R = M - S.
    pub fn from_mid_side(mid: &[f32], side: &[f32], sample_rate: u32) -> Self {
        let left = mid.iter().zip(side).map(|(m, s)| m + s).collect();
        let right = mid.iter().zip(side).map(|(m, s)| m - s).collect();
        Self {
            samples: vec![left, right],
            sample_rate,
        }
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// # Errors
    /// `InvalidAudio` if the data length doesn't match the layout
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(MatchError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());

        for sample_idx in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }

        interleaved
    }

    /// Upmix to stereo by duplicating a mono channel; stereo is returned as is
    pub fn to_stereo(self) -> Self {
        match self.channel_layout() {
            Some(ChannelLayout::Mono) => {
                let mono = self.samples.into_iter().next().unwrap_or_default();
                Self {
                    samples: vec![mono.clone(), mono],
                    sample_rate: self.sample_rate,
                }
            }
            _ => self,
        }
    }

    /// Split a stereo buffer into mid (L+R)/2 and side (L-R)/2 signals
    pub fn to_mid_side(&self) -> (Vec<f32>, Vec<f32>) {
        let left = self.channel(0);
        let right = self.channel(self.channels().saturating_sub(1));
        let mid = left.iter().zip(right).map(|(l, r)| (l + r) * 0.5).collect();
        let side = left.iter().zip(right).map(|(l, r)| (l - r) * 0.5).collect();
        (mid, side)
    }

    /// Mid signal only
    pub fn mid(&self) -> Vec<f32> {
        let left = self.channel(0);
        let right = self.channel(self.channels().saturating_sub(1));
        left.iter().zip(right).map(|(l, r)| (l + r) * 0.5).collect()
    }

    /// Return a copy with every sample multiplied by `gain`
    pub fn scaled(&self, gain: f32) -> Self {
        self.map_samples(|s| s * gain)
    }

    /// Return a copy with `f` applied to every sample
    pub fn map_samples(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            samples: self
                .samples
                .iter()
                .map(|channel| channel.iter().map(|&s| f(s)).collect())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get the channel layout, None for unsupported channel counts
    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_count(self.channels())
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Peak absolute amplitude across all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .map(|channel| peak(channel))
            .fold(0.0_f32, f32::max)
    }

    /// RMS across all channels
    pub fn rms(&self) -> f32 {
        let total = self.channels() * self.len();
        if total == 0 {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        (sum_squares / total as f64).sqrt() as f32
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// Check if every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|&s| s == 0.0)
    }

    /// SHA-256 digest over the raw sample bytes and layout
    ///
    /// Two buffers with the same digest are byte-identical.
    pub fn content_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((self.channels() as u64).to_le_bytes());
        hasher.update((self.len() as u64).to_le_bytes());
        for channel in &self.samples {
            for sample in channel {
                hasher.update(sample.to_le_bytes());
            }
        }
        hasher.finalize().into()
    }
}

// ============================================================================
// Tests
// ============================================================================
