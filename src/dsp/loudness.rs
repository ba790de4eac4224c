//! Loudness matching
//!
//! Brings the target to the reference's level, measured as the RMS of the
//! loudest pieces of the mid channel. Because the measurement clips at the
//! configured threshold, the gain is refined over a few passes so that
//! peaks pushed over the threshold do not inflate the estimate.

use tracing::debug;

use crate::config::Config;
use crate::engine::buffer::AudioBuffer;

/// RMS over the loudest pieces of a signal
///
/// The signal is split into `ceil(len / piece_len)` near-equal pieces; the
/// pieces whose RMS is at or above the average RMS are kept and their RMS
/// is combined.
pub fn loudest_pieces_rms(samples: &[f32], piece_len: usize) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let pieces = samples.len().div_ceil(piece_len.max(1));
    let base = samples.len() / pieces;
    let extra = samples.len() % pieces;

    let mut mean_squares = Vec::with_capacity(pieces);
    let mut start = 0;
    for i in 0..pieces {
        let len = base + usize::from(i < extra);
        let piece = &samples[start..start + len];
        let sum: f64 = piece.iter().map(|&s| s as f64 * s as f64).sum();
        mean_squares.push(sum / len.max(1) as f64);
        start += len;
    }

    let average = mean_squares.iter().sum::<f64>() / pieces as f64;
    let loudest: Vec<f64> = mean_squares
        .iter()
        .copied()
        .filter(|&ms| ms >= average)
        .collect();
    let selected = if loudest.is_empty() {
        &mean_squares
    } else {
        &loudest
    };

    (selected.iter().sum::<f64>() / selected.len() as f64).sqrt() as f32
}

/// Computes and applies the gain that matches target loudness to a reference
pub struct LoudnessMatcher<'a> {
    config: &'a Config,
}

impl<'a> LoudnessMatcher<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Loudness of a buffer as this stage measures it
    pub fn measure(&self, buffer: &AudioBuffer) -> f32 {
        self.measure_mid(&buffer.mid(), 1.0)
    }

    fn measure_mid(&self, mid: &[f32], gain: f32) -> f32 {
        let threshold = self.config.threshold;
        let clipped: Vec<f32> = mid
            .iter()
            .map(|&s| (s * gain).clamp(-threshold, threshold))
            .collect();
        loudest_pieces_rms(&clipped, self.config.max_piece_samples())
    }

    /// Gain that brings `target` to `reference_level`
    ///
    /// Unity when either side is silent.
    pub fn compute_gain(&self, target: &AudioBuffer, reference_level: f32) -> f32 {
        let eps = self.config.min_value;
        if !(reference_level > eps) {
            debug!("Reference level is silent, keeping unity gain");
            return 1.0;
        }

        let mid = target.mid();
        let mut gain = 1.0_f32;
        for step in 0..self.config.rms_correction_steps.max(1) {
            let level = self.measure_mid(&mid, gain);
            if !(level > eps) {
                if step == 0 {
                    debug!("Target level is silent, keeping unity gain");
                }
                break;
            }
            let correction = reference_level / level;
            gain *= correction;
            debug!("Loudness step {}: correction {:.6}, gain {:.6}", step, correction, gain);
            if (correction - 1.0).abs() < 1e-6 {
                break;
            }
        }
        gain
    }

    /// Scale the target to the reference level, returning the gain used
    pub fn apply(&self, target: &AudioBuffer, reference_level: f32) -> (AudioBuffer, f32) {
        let gain = self.compute_gain(target, reference_level);
        (target.scaled(gain), gain)
    }
}
