//! Spectral matching
//!
//! Derives a linear-phase correction filter per analysis channel (mid and
//! side) from the averaged magnitude spectra of target and reference, and
//! applies it to the full-length target by overlap-save convolution.
//!
//! # Algorithm
//! 1. Split the stereo buffer into mid (L+R)/2 and side (L-R)/2.
//! 2. Average Hann-windowed magnitude spectra over overlapping frames.
//! 3. Per bin, take the level-compensated ratio reference / target.
//! 4. Smooth the ratio (in dB) over a fractional-octave window and clip it.
//! 5. Inverse-transform, centre and window it into an `fft_size` kernel.
//! 6. Convolve mid and side with their kernels and rebuild L/R.

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::engine::buffer::{db_to_linear, linear_to_db, AudioBuffer};

/// Frames summed sequentially by one parallel task
///
/// Fixed grouping keeps the summation order, and so the result, independent
/// of the thread count.
const FRAMES_PER_TASK: usize = 32;

// ============================================================================
// Spectra
// ============================================================================

/// Averaged magnitude spectra of the two analysis channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoSpectrum {
    /// Mid channel, `fft_size / 2 + 1` bins
    pub mid: Vec<f32>,
    /// Side channel, `fft_size / 2 + 1` bins
    pub side: Vec<f32>,
}

impl StereoSpectrum {
    /// Number of frequency bins per channel
    pub fn bins(&self) -> usize {
        self.mid.len()
    }

    /// Check that both channels hold finite, non-negative magnitudes
    pub fn is_well_formed(&self) -> bool {
        self.mid.len() == self.side.len()
            && self
                .mid
                .iter()
                .chain(&self.side)
                .all(|m| m.is_finite() && *m >= 0.0)
    }
}

/// Periodic Hann window of length `len`
pub fn periodic_hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| {
            let phase = 2.0 * std::f64::consts::PI * n as f64 / len as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

/// Mean magnitude spectrum of `signal` over Hann-windowed frames
///
/// Frames start every `hop` samples; a signal shorter than one frame is
/// zero-padded into a single frame.
pub fn average_magnitude(signal: &[f32], fft_size: usize, hop: usize) -> Vec<f32> {
    let bins = fft_size / 2 + 1;
    let frame_count = if signal.len() >= fft_size {
        1 + (signal.len() - fft_size) / hop.max(1)
    } else {
        1
    };

    let window = periodic_hann(fft_size);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
    let starts: Vec<usize> = (0..frame_count).map(|f| f * hop).collect();

    let partials: Vec<Vec<f64>> = starts
        .par_chunks(FRAMES_PER_TASK)
        .map(|group| {
            let mut frame = vec![Complex::new(0.0_f32, 0.0); fft_size];
            let mut scratch = vec![Complex::new(0.0_f32, 0.0); fft.get_inplace_scratch_len()];
            let mut sums = vec![0.0_f64; bins];

            for &start in group {
                for (i, slot) in frame.iter_mut().enumerate() {
                    let sample = signal.get(start + i).copied().unwrap_or(0.0);
                    *slot = Complex::new(sample * window[i], 0.0);
                }
                fft.process_with_scratch(&mut frame, &mut scratch);
                for (acc, bin) in sums.iter_mut().zip(&frame[..bins]) {
                    *acc += bin.norm() as f64;
                }
            }
            sums
        })
        .collect();

    let mut total = vec![0.0_f64; bins];
    for partial in &partials {
        for (t, p) in total.iter_mut().zip(partial) {
            *t += p;
        }
    }

    total
        .into_iter()
        .map(|t| (t / frame_count as f64) as f32)
        .collect()
}

/// Fractional-octave moving average over frequency bins
///
/// Bin `k` is replaced by the mean of bins `k / w ..= k * w` with
/// `w = 2^(octaves / 2)`. DC takes the value of bin 1.
pub fn smooth_log_frequency(values: &[f32], octaves: f32) -> Vec<f32> {
    let n = values.len();
    if n < 3 || octaves <= 0.0 {
        return values.to_vec();
    }

    let mut prefix = vec![0.0_f64; n + 1];
    for (i, &v) in values.iter().enumerate() {
        prefix[i + 1] = prefix[i] + v as f64;
    }

    let width = 2.0_f64.powf(octaves as f64 / 2.0);
    let mut smoothed: Vec<f32> = (0..n)
        .map(|k| {
            if k == 0 {
                return 0.0;
            }
            let lo = ((k as f64 / width).round() as usize).clamp(1, k);
            let hi = ((k as f64 * width).round() as usize).clamp(k, n - 1);
            ((prefix[hi + 1] - prefix[lo]) / (hi + 1 - lo) as f64) as f32
        })
        .collect();
    smoothed[0] = smoothed[1];
    smoothed
}

// ============================================================================
// Correction Filter
// ============================================================================

/// Frequency-domain gain curve and its linear-phase FIR kernel
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionFilter {
    gains: Vec<f32>,
    kernel: Vec<f32>,
}

impl CorrectionFilter {
    /// Build the kernel for a gain curve of `fft_size / 2 + 1` bins
    ///
    /// The zero-phase response is inverse-transformed, rotated so its peak
    /// sits at `fft_size / 2`, and windowed, giving a symmetric kernel of
    /// exactly `fft_size` taps.
    pub fn from_gains(gains: Vec<f32>) -> Self {
        let fft_size = gains.len().saturating_sub(1) * 2;
        if fft_size == 0 {
            return Self {
                gains,
                kernel: vec![1.0],
            };
        }
        let half = fft_size / 2;

        let mut spectrum: Vec<Complex<f32>> = (0..fft_size)
            .map(|k| {
                let bin = if k <= half { k } else { fft_size - k };
                Complex::new(gains[bin], 0.0)
            })
            .collect();
        FftPlanner::<f32>::new()
            .plan_fft_inverse(fft_size)
            .process(&mut spectrum);

        let scale = 1.0 / fft_size as f32;
        let window = periodic_hann(fft_size);
        let kernel = (0..fft_size)
            .map(|n| spectrum[(n + half) % fft_size].re * scale * window[n])
            .collect();

        Self { gains, kernel }
    }

    /// Pass-through filter: unity gain at every bin
    pub fn flat(fft_size: usize) -> Self {
        Self::from_gains(vec![1.0; fft_size / 2 + 1])
    }

    /// Smoothed, clipped linear gain per bin
    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    /// FIR taps
    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    /// Number of taps
    pub fn len(&self) -> usize {
        self.kernel.len()
    }

    /// True for a degenerate filter without taps
    pub fn is_empty(&self) -> bool {
        self.kernel.is_empty()
    }

    /// Check that gains and taps are all finite
    pub fn is_finite(&self) -> bool {
        self.gains.iter().chain(&self.kernel).all(|v| v.is_finite())
    }

    /// Magnitude response of the kernel in dB, one value per bin
    pub fn magnitude_response_db(&self) -> Vec<f32> {
        let n = self.kernel.len();
        let mut spectrum: Vec<Complex<f32>> =
            self.kernel.iter().map(|&t| Complex::new(t, 0.0)).collect();
        FftPlanner::<f32>::new()
            .plan_fft_forward(n)
            .process(&mut spectrum);
        spectrum[..n / 2 + 1]
            .iter()
            .map(|c| linear_to_db(c.norm()))
            .collect()
    }

    /// Largest deviation of the kernel's response from 0 dB
    pub fn max_deviation_db(&self) -> f32 {
        self.magnitude_response_db()
            .into_iter()
            .map(f32::abs)
            .fold(0.0_f32, f32::max)
    }
}

/// Correction filters for both analysis channels
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionFilters {
    pub mid: CorrectionFilter,
    pub side: CorrectionFilter,
}

impl CorrectionFilters {
    /// Check both filters for finite values
    pub fn is_finite(&self) -> bool {
        self.mid.is_finite() && self.side.is_finite()
    }

    /// Largest deviation from a flat response across both filters
    pub fn max_deviation_db(&self) -> f32 {
        self.mid.max_deviation_db().max(self.side.max_deviation_db())
    }
}

// ============================================================================
// Convolution
// ============================================================================

/// Convolve `signal` with `kernel`, aligned on the kernel centre
///
/// Output sample `n` is `sum_j kernel[j] * signal[n + len/2 - j]`, so a
/// centred linear-phase kernel introduces no delay. Uses overlap-save with
/// disjoint output blocks computed in parallel.
pub fn convolve_same(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let taps = kernel.len();
    if signal.is_empty() || taps == 0 {
        return vec![0.0; signal.len()];
    }
    let center = taps / 2;
    let n = (2 * taps).next_power_of_two();
    let block = n - taps + 1;

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);
    let scratch_len = forward
        .get_inplace_scratch_len()
        .max(inverse.get_inplace_scratch_len());

    let mut response: Vec<Complex<f32>> = kernel
        .iter()
        .map(|&t| Complex::new(t, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(n)
        .collect();
    forward.process(&mut response);

    let scale = 1.0 / n as f32;
    let mut output = vec![0.0_f32; signal.len()];

    output
        .par_chunks_mut(block)
        .enumerate()
        .for_each_init(
            || {
                (
                    vec![Complex::new(0.0_f32, 0.0); n],
                    vec![Complex::new(0.0_f32, 0.0); scratch_len],
                )
            },
            |(segment, scratch), (index, chunk)| {
                let start = (index * block + center) as isize - (taps as isize - 1);
                for (i, slot) in segment.iter_mut().enumerate() {
                    let pos = start + i as isize;
                    let sample = if pos >= 0 {
                        signal.get(pos as usize).copied().unwrap_or(0.0)
                    } else {
                        0.0
                    };
                    *slot = Complex::new(sample, 0.0);
                }

                forward.process_with_scratch(segment, scratch);
                for (bin, h) in segment.iter_mut().zip(&response) {
                    *bin *= h;
                }
                inverse.process_with_scratch(segment, scratch);

                for (t, out) in chunk.iter_mut().enumerate() {
                    *out = segment[taps - 1 + t].re * scale;
                }
            },
        );

    output
}

// ============================================================================
// Spectral Matcher
// ============================================================================

/// Matches the long-term frequency balance of a target to a reference
pub struct SpectralMatcher<'a> {
    config: &'a Config,
}

impl<'a> SpectralMatcher<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Average mid and side magnitude spectra of a stereo buffer
    pub fn analyze(&self, buffer: &AudioBuffer) -> StereoSpectrum {
        let (mid, side) = buffer.to_mid_side();
        let (fft_size, hop) = (self.config.fft_size, self.config.hop_size());
        let (mid, side) = rayon::join(
            || average_magnitude(&mid, fft_size, hop),
            || average_magnitude(&side, fft_size, hop),
        );
        StereoSpectrum { mid, side }
    }

    /// Design correction filters from target and reference spectra
    ///
    /// `target_level` and `reference_level` are the stereo RMS levels the
    /// spectra were measured at; the reference is rescaled by their ratio so
    /// the filters correct balance, not overall level.
    pub fn design(
        &self,
        target: &StereoSpectrum,
        target_level: f32,
        reference: &StereoSpectrum,
        reference_level: f32,
    ) -> CorrectionFilters {
        let eps = self.config.min_value;
        let level = if target_level > eps && reference_level > eps {
            target_level / reference_level
        } else {
            1.0
        };

        let (mid, side) = rayon::join(
            || self.design_channel(&target.mid, &reference.mid, level),
            || self.design_channel(&target.side, &reference.side, level),
        );
        CorrectionFilters { mid, side }
    }

    fn design_channel(&self, target: &[f32], reference: &[f32], level: f32) -> CorrectionFilter {
        let eps = self.config.min_value;
        let ratio_db: Vec<f32> = target
            .iter()
            .zip(reference)
            .map(|(&t, &r)| 20.0 * ((r * level + eps) / (t + eps)).log10())
            .collect();

        let smoothed = smooth_log_frequency(&ratio_db, self.config.smoothing_octaves);
        let gains = smoothed
            .into_iter()
            .map(|db| db_to_linear(db.clamp(-self.config.max_cut_db, self.config.max_boost_db)))
            .collect();

        CorrectionFilter::from_gains(gains)
    }

    /// Filter the target with the given correction filters
    pub fn apply(&self, target: &AudioBuffer, filters: &CorrectionFilters) -> AudioBuffer {
        let (mid, side) = target.to_mid_side();
        let (mid, side) = rayon::join(
            || convolve_same(&mid, filters.mid.kernel()),
            || convolve_same(&side, filters.side.kernel()),
        );
        AudioBuffer::from_mid_side(&mid, &side, target.sample_rate())
    }

    /// Analyze the target, design the filters and apply them
    pub fn match_to(
        &self,
        target: &AudioBuffer,
        reference: &StereoSpectrum,
        reference_level: f32,
    ) -> (AudioBuffer, CorrectionFilters) {
        let spectrum = self.analyze(target);
        let filters = self.design(&spectrum, target.rms(), reference, reference_level);
        debug!(
            "Correction filters designed: {} taps, max deviation {:.2} dB",
            filters.mid.len(),
            filters.max_deviation_db()
        );
        let corrected = self.apply(target, &filters);
        (corrected, filters)
    }
}

// ============================================================================
// Tests
// ============================================================================
