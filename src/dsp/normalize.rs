//! Peak normalization

use crate::engine::buffer::AudioBuffer;

/// Scale a buffer so its absolute peak lands on `threshold`
///
/// The divisor is `max(peak / threshold, epsilon)`, so silence stays silent
/// and quiet material is raised. Returns the normalized buffer and the
/// linear gain applied.
pub fn normalize_peak(buffer: &AudioBuffer, threshold: f32, epsilon: f32) -> (AudioBuffer, f32) {
    let coefficient = (buffer.peak() / threshold).max(epsilon);
    let gain = 1.0 / coefficient;
    (buffer.scaled(gain), gain)
}
