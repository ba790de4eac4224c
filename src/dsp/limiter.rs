//! Lookahead Limiter
//!
//! Brickwall limiter that sees `lookahead` frames ahead of its output, so
//! gain reduction is already in place when a peak arrives. Both channels
//! share one gain envelope to keep the stereo image intact.

use std::collections::VecDeque;

use crate::config::LimiterConfig;
use crate::engine::buffer::{db_to_linear, AudioBuffer};

// ============================================================================
// Constants
// ============================================================================

/// Minimum ceiling in dB
const MIN_CEILING_DB: f32 = -60.0;
/// Maximum ceiling in dB
const MAX_CEILING_DB: f32 = 0.0;

/// Minimum release time in ms
const MIN_RELEASE_MS: f32 = 1.0;
/// Maximum release time in ms
const MAX_RELEASE_MS: f32 = 5000.0;

/// Upper bound on `attack_coeff ^ lookahead`
const LOOKAHEAD_RESIDUAL: f32 = 0.01;
/// Residual the attack aims for; larger than `LOOKAHEAD_RESIDUAL` so the
/// envelope reaches the required gain before the window runs out
const ATTACK_AIM_RESIDUAL: f32 = 2.0 * LOOKAHEAD_RESIDUAL;

// ============================================================================
// Helper Functions
// ============================================================================

/// Calculate envelope coefficient from time constant
#[inline]
fn time_to_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    (-1.0 / (time_ms * sample_rate / 1000.0)).exp()
}

#[inline]
fn ms_to_samples(time_ms: f32, sample_rate: f32) -> usize {
    (time_ms * sample_rate / 1000.0).round() as usize
}

#[inline]
fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

// ============================================================================
// Limiter
// ============================================================================

/// Stereo lookahead brickwall limiter
///
/// Input frames are delayed by the lookahead; the gain applied to a frame is
/// driven by the smallest gain any frame inside the window requires. The
/// attack lands on that gain no later than the frame needing it leaves the
/// delay line, then the envelope holds and releases. A final clamp only
/// absorbs rounding.
///
/// # Example
/// ```ignore
/// use refmatch::config::LimiterConfig;
/// use refmatch::dsp::Limiter;
///
/// let mut limiter = Limiter::new(&LimiterConfig::default(), 44100);
/// let limited = limiter.process(&buffer);
/// ```
#[derive(Debug, Clone)]
pub struct Limiter {
    ceiling_db: f32,
    ceiling_linear: f32,
    release_ms: f32,
    sample_rate: f32,
    lookahead: usize,
    hold_samples: usize,
    attack_coeff: f32,
    release_coeff: f32,

    delay: VecDeque<[f32; 2]>,
    /// Monotonic queue of (frame index, required gain) for the window minimum
    required: VecDeque<(usize, f32)>,
    position: usize,
    envelope: f32,
    hold_counter: usize,
}

impl Limiter {
    /// Create a limiter for the given sample rate
    pub fn new(config: &LimiterConfig, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        let ceiling_db = config.ceiling_db.clamp(MIN_CEILING_DB, MAX_CEILING_DB);
        let lookahead = ms_to_samples(config.lookahead_ms, sample_rate).max(1);

        let lookahead_coeff = (LOOKAHEAD_RESIDUAL.ln() / lookahead as f32).exp();
        let attack_coeff = time_to_coeff(config.attack_ms, sample_rate).min(lookahead_coeff);
        let release_ms = config.release_ms.clamp(MIN_RELEASE_MS, MAX_RELEASE_MS);

        Self {
            ceiling_db,
            ceiling_linear: db_to_linear(ceiling_db),
            release_ms,
            sample_rate,
            lookahead,
            hold_samples: ms_to_samples(config.hold_ms, sample_rate),
            attack_coeff,
            release_coeff: time_to_coeff(release_ms, sample_rate),
            delay: VecDeque::with_capacity(lookahead + 1),
            required: VecDeque::with_capacity(lookahead + 1),
            position: 0,
            envelope: 1.0,
            hold_counter: 0,
        }
    }

    /// Get ceiling in dB
    pub fn ceiling_db(&self) -> f32 {
        self.ceiling_db
    }

    /// Get ceiling in linear
    pub fn ceiling_linear(&self) -> f32 {
        self.ceiling_linear
    }

    /// Set release time in milliseconds
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.clamp(MIN_RELEASE_MS, MAX_RELEASE_MS);
        self.release_coeff = time_to_coeff(self.release_ms, self.sample_rate);
    }

    /// Get release time in milliseconds
    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Latency in frames
    pub fn lookahead_samples(&self) -> usize {
        self.lookahead
    }

    /// Current linear gain of the envelope
    pub fn gain(&self) -> f32 {
        self.envelope
    }

    /// Clear delay line and envelope
    pub fn reset(&mut self) {
        self.delay.clear();
        self.required.clear();
        self.position = 0;
        self.envelope = 1.0;
        self.hold_counter = 0;
    }

    /// Feed one stereo frame; returns the frame leaving the delay line
    ///
    /// Returns `None` until the lookahead window has filled.
    pub fn push_frame(&mut self, frame: [f32; 2]) -> Option<[f32; 2]> {
        let frame = [sanitize(frame[0]), sanitize(frame[1])];
        let peak = frame[0].abs().max(frame[1].abs());
        let required = if peak > self.ceiling_linear {
            self.ceiling_linear / peak
        } else {
            1.0
        };

        let index = self.position;
        self.position += 1;
        while matches!(self.required.back(), Some(&(_, gain)) if gain >= required) {
            self.required.pop_back();
        }
        self.required.push_back((index, required));

        self.delay.push_back(frame);
        if self.delay.len() <= self.lookahead {
            return None;
        }
        let delayed = self.delay.pop_front()?;

        let oldest = index - self.lookahead;
        while matches!(self.required.front(), Some(&(i, _)) if i < oldest) {
            self.required.pop_front();
        }
        let target = self.required.front().map_or(1.0, |&(_, gain)| gain);
        self.update_envelope(target);

        let c = self.ceiling_linear;
        Some([
            (delayed[0] * self.envelope).clamp(-c, c),
            (delayed[1] * self.envelope).clamp(-c, c),
        ])
    }

    fn update_envelope(&mut self, target: f32) {
        if target < self.envelope {
            // Attack towards a point below the target, stopping on the target.
            // From any envelope <= 1 this reaches it within `lookahead` steps.
            let aim = (target - ATTACK_AIM_RESIDUAL) / (1.0 - ATTACK_AIM_RESIDUAL);
            self.envelope = (aim + (self.envelope - aim) * self.attack_coeff).max(target);
            self.hold_counter = self.hold_samples;
        } else if self.hold_counter > 0 {
            self.hold_counter -= 1;
        } else {
            // Release
            self.envelope = target + (self.envelope - target) * self.release_coeff;
        }
    }

    /// Limit a whole stereo buffer
    ///
    /// The limiter is reset first and flushed with silence afterwards, so the
    /// output is time-aligned with the input and has the same length.
    pub fn process(&mut self, buffer: &AudioBuffer) -> AudioBuffer {
        self.reset();
        let len = buffer.len();
        let (left_in, right_in) = (buffer.channel(0), buffer.channel(buffer.channels() - 1));

        let mut left = Vec::with_capacity(len);
        let mut right = Vec::with_capacity(len);
        let flush = std::iter::repeat([0.0, 0.0]).take(self.lookahead);
        let frames = left_in.iter().zip(right_in).map(|(&l, &r)| [l, r]);

        for frame in frames.chain(flush) {
            if let Some([l, r]) = self.push_frame(frame) {
                left.push(l);
                right.push(r);
            }
        }
        left.truncate(len);
        right.truncate(len);

        AudioBuffer::from_planar(vec![left, right], buffer.sample_rate())
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(&LimiterConfig::default(), crate::engine::buffer::DEFAULT_SAMPLE_RATE)
    }
}

// ============================================================================
// Tests
// ============================================================================
