//! DSP stages of the matching pipeline
//!
//! Spectral matching, loudness matching, lookahead limiting and peak
//! normalization. Each stage takes an immutable [`AudioBuffer`] and returns
//! a new one.
//!
//! [`AudioBuffer`]: crate::engine::AudioBuffer

pub mod limiter;
pub mod loudness;
pub mod normalize;
pub mod spectral;

pub use limiter::Limiter;
pub use loudness::{loudest_pieces_rms, LoudnessMatcher};
pub use normalize::normalize_peak;
pub use spectral::{convolve_same, CorrectionFilter, CorrectionFilters, SpectralMatcher, StereoSpectrum};
