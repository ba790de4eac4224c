//! Processing configuration and output requests
//!
//! A [`Config`] is built fresh for every invocation (from defaults or a JSON
//! file) and is never mutated once processing starts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::buffer::DEFAULT_SAMPLE_RATE;
use crate::error::{MatchError, Result};

// ============================================================================
// Constants
// ============================================================================

/// 16-bit full scale minus a small safety margin: (32768 - 61) / 32768
pub const DEFAULT_THRESHOLD: f32 = 0.998_138_4;

/// Smallest FFT size accepted for spectral analysis
pub const MIN_FFT_SIZE: usize = 64;

// ============================================================================
// Limiter Configuration
// ============================================================================

/// Lookahead limiter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Maximum output level in dBFS
    pub ceiling_db: f32,
    /// Lookahead window in milliseconds
    pub lookahead_ms: f32,
    /// Attack time constant in milliseconds
    pub attack_ms: f32,
    /// Time the gain reduction is held before releasing, in milliseconds
    pub hold_ms: f32,
    /// Release time constant in milliseconds
    pub release_ms: f32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            ceiling_db: -0.1,
            lookahead_ms: 5.0,
            attack_ms: 1.0,
            hold_ms: 1.0,
            release_ms: 250.0,
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Matching and mastering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Processing rate; every buffer entering the core must use it
    pub internal_sample_rate: u32,
    /// Longest accepted input, in seconds
    pub max_length_secs: f64,
    /// Piece length used by the loudest-pieces RMS measurement, in seconds
    pub max_piece_secs: f64,
    /// Peak target of the final normalization and clip level of loudness correction
    pub threshold: f32,
    /// Numeric floor used wherever a division could hit zero
    pub min_value: f32,
    /// Analysis window and correction filter length (power of two)
    pub fft_size: usize,
    /// Analysis frame stride is `fft_size / analysis_hop_divisor`
    pub analysis_hop_divisor: usize,
    /// Width of the log-frequency smoothing window, in octaves
    pub smoothing_octaves: f32,
    /// Largest boost the correction filter may apply, in dB
    pub max_boost_db: f32,
    /// Largest cut the correction filter may apply, in dB (positive)
    pub max_cut_db: f32,
    /// Iterations of the clip-aware loudness gain refinement
    pub rms_correction_steps: usize,
    /// Samples at full scale above which the target is reported as clipped
    pub clipping_samples_threshold: usize,
    /// Samples at full scale above which the reference is reported as limited
    pub limited_samples_threshold: usize,
    /// Permit byte-identical target and reference
    pub allow_equality: bool,
    /// Stored preset used instead of a reference recording
    pub reference_preset: Option<PathBuf>,
    /// Limiter parameters
    pub limiter: LimiterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            internal_sample_rate: DEFAULT_SAMPLE_RATE,
            max_length_secs: 15.0 * 60.0,
            max_piece_secs: 15.0,
            threshold: DEFAULT_THRESHOLD,
            min_value: 1e-6,
            fft_size: 4096,
            analysis_hop_divisor: 4,
            smoothing_octaves: 1.0 / 6.0,
            max_boost_db: 12.0,
            max_cut_db: 24.0,
            rms_correction_steps: 4,
            clipping_samples_threshold: 8,
            limited_samples_threshold: 128,
            allow_equality: false,
            reference_preset: None,
            limiter: LimiterConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MatchError::FileNotFound {
            path: path.display().to_string(),
            source: Some(e),
        })?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Analysis frame stride in samples
    pub fn hop_size(&self) -> usize {
        (self.fft_size / self.analysis_hop_divisor).max(1)
    }

    /// Loudest-pieces piece length in samples
    pub fn max_piece_samples(&self) -> usize {
        ((self.max_piece_secs * self.internal_sample_rate as f64) as usize).max(1)
    }

    /// Check that every option holds a usable value
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(MatchError::InvalidConfig { reason });

        if self.internal_sample_rate == 0 {
            return invalid("internal_sample_rate must be positive".into());
        }
        if !self.fft_size.is_power_of_two() || self.fft_size < MIN_FFT_SIZE {
            return invalid(format!(
                "fft_size must be a power of two >= {}, got {}",
                MIN_FFT_SIZE, self.fft_size
            ));
        }
        if self.analysis_hop_divisor == 0 || self.analysis_hop_divisor > self.fft_size {
            return invalid(format!(
                "analysis_hop_divisor must be in 1..={}, got {}",
                self.fft_size, self.analysis_hop_divisor
            ));
        }
        if !(self.max_length_secs > 0.0) || !(self.max_piece_secs > 0.0) {
            return invalid("max_length_secs and max_piece_secs must be positive".into());
        }
        if !(self.min_value > 0.0 && self.min_value < 0.1) {
            return invalid(format!("min_value must be in (0, 0.1), got {}", self.min_value));
        }
        if !(self.threshold > self.min_value && self.threshold <= 1.0) {
            return invalid(format!(
                "threshold must be in (min_value, 1.0], got {}",
                self.threshold
            ));
        }
        if !(self.smoothing_octaves >= 0.0 && self.smoothing_octaves.is_finite()) {
            return invalid("smoothing_octaves must be a finite non-negative number".into());
        }
        if !(self.max_boost_db >= 0.0) || !(self.max_cut_db >= 0.0) {
            return invalid("max_boost_db and max_cut_db must be non-negative".into());
        }

        let limiter = &self.limiter;
        if !(limiter.ceiling_db <= 0.0 && limiter.ceiling_db > -60.0) {
            return invalid(format!(
                "limiter.ceiling_db must be in (-60, 0], got {}",
                limiter.ceiling_db
            ));
        }
        if !(limiter.lookahead_ms > 0.0)
            || !(limiter.attack_ms > 0.0)
            || !(limiter.release_ms > 0.0)
            || !(limiter.hold_ms >= 0.0)
        {
            return invalid("limiter time constants must be positive".into());
        }

        Ok(())
    }
}

// ============================================================================
// Output Requests
// ============================================================================

/// Sample encoding of an exported result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSubtype {
    /// 16-bit integer PCM
    #[default]
    Pcm16,
    /// 24-bit integer PCM
    Pcm24,
    /// 32-bit IEEE float
    Float32,
}

impl OutputSubtype {
    /// Bits per sample written by the exporter
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            OutputSubtype::Pcm16 => 16,
            OutputSubtype::Pcm24 => 24,
            OutputSubtype::Float32 => 32,
        }
    }
}

/// One desired output of a matching run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRequest {
    /// Destination handed to the exporter
    pub path: PathBuf,
    /// Sample encoding handed to the exporter
    pub subtype: OutputSubtype,
    /// Run the lookahead limiter
    pub use_limiter: bool,
    /// Peak-normalize the unlimited result (ignored when limiting)
    pub normalize: bool,
    /// Skip the spectral correction
    pub no_eq: bool,
}

impl OutputRequest {
    /// Limited, normalized, equalized output with the given encoding
    pub fn new(path: impl Into<PathBuf>, subtype: OutputSubtype) -> Self {
        Self {
            path: path.into(),
            subtype,
            use_limiter: true,
            normalize: true,
            no_eq: false,
        }
    }

    /// 16-bit PCM output with default processing
    pub fn pcm16(path: impl Into<PathBuf>) -> Self {
        Self::new(path, OutputSubtype::Pcm16)
    }

    /// 24-bit PCM output with default processing
    pub fn pcm24(path: impl Into<PathBuf>) -> Self {
        Self::new(path, OutputSubtype::Pcm24)
    }

    /// 32-bit float output with default processing
    pub fn float32(path: impl Into<PathBuf>) -> Self {
        Self::new(path, OutputSubtype::Float32)
    }

    /// Set whether the limiter runs
    pub fn with_limiter(mut self, use_limiter: bool) -> Self {
        self.use_limiter = use_limiter;
        self
    }

    /// Set whether the unlimited result is normalized
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Set whether the spectral correction is skipped
    pub fn with_no_eq(mut self, no_eq: bool) -> Self {
        self.no_eq = no_eq;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hop_size(), 1024);
        assert_eq!(config.max_piece_samples(), 15 * 44100);
    }

    #[test]
    fn test_rejects_non_power_of_two_fft() {
        let config = Config {
            fft_size: 3000,
            ..Config::default()
        };
        assert_eq!(
            config.validate().unwrap_err().error_code(),
            "INVALID_CONFIG"
        );
    }

    #[test]
    fn test_rejects_bad_threshold_and_limiter() {
        let config = Config {
            threshold: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limiter.ceiling_db = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limiter.release_ms = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_with_partial_fields() {
        let config: Config =
            serde_json::from_str(r#"{ "fft_size": 2048, "limiter": { "ceiling_db": -1.0 } }"#)
                .unwrap();
        assert_eq!(config.fft_size, 2048);
        assert_eq!(config.limiter.ceiling_db, -1.0);
        assert_eq!(config.limiter.lookahead_ms, LimiterConfig::default().lookahead_ms);
        assert_eq!(config.internal_sample_rate, 44100);

        let text = config.to_json_string().unwrap();
        let back: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "allow_equality": true }"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert!(config.allow_equality);

        let missing = Config::from_json_file(&dir.path().join("missing.json"));
        assert_eq!(missing.unwrap_err().error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_output_request_builders() {
        let request = OutputRequest::pcm24("out.wav")
            .with_limiter(false)
            .with_normalize(false)
            .with_no_eq(true);
        assert_eq!(request.subtype, OutputSubtype::Pcm24);
        assert!(!request.use_limiter);
        assert!(!request.normalize);
        assert!(request.no_eq);

        let default = OutputRequest::pcm16("a.wav");
        assert!(default.use_limiter && default.normalize && !default.no_eq);
        assert_eq!(OutputSubtype::Float32.bits_per_sample(), 32);
    }
}
