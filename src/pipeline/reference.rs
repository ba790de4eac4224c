//! Reference profiles and presets
//!
//! Matching only needs three things from a reference: its averaged mid/side
//! spectra, its stereo RMS and its loudness. A [`ReferenceProfile`] holds
//! exactly those, so it can be computed from a recording once and stored
//! as a JSON preset for later runs.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::dsp::loudness::LoudnessMatcher;
use crate::dsp::spectral::{SpectralMatcher, StereoSpectrum};
use crate::engine::buffer::AudioBuffer;
use crate::error::{MatchError, Result};

/// Version written into every preset file
pub const PRESET_FORMAT_VERSION: u32 = 1;

/// Everything the matching stages need to know about a reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    pub format_version: u32,
    /// Rate the spectra were measured at
    pub sample_rate: u32,
    /// Analysis size the spectra were measured with
    pub fft_size: usize,
    pub spectrum: StereoSpectrum,
    /// Stereo RMS the spectra were measured at
    pub level_rms: f32,
    /// Loudest-pieces RMS used as the loudness target
    pub match_rms: f32,
}

/// A reference profile stored on disk
pub type PresetCurve = ReferenceProfile;

impl ReferenceProfile {
    /// Measure a reference recording
    pub fn analyze(reference: &AudioBuffer, config: &Config) -> Self {
        let spectrum = SpectralMatcher::new(config).analyze(reference);
        let match_rms = LoudnessMatcher::new(config).measure(reference);
        let profile = Self {
            format_version: PRESET_FORMAT_VERSION,
            sample_rate: reference.sample_rate(),
            fft_size: config.fft_size,
            spectrum,
            level_rms: reference.rms(),
            match_rms,
        };
        debug!(
            "Reference profile: {} bins, level {:.4}, loudness {:.4}",
            profile.spectrum.bins(),
            profile.level_rms,
            profile.match_rms
        );
        profile
    }

    /// Load a preset from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MatchError::FileNotFound {
            path: path.display().to_string(),
            source: Some(e),
        })?;
        let profile: ReferenceProfile = serde_json::from_str(&text)?;
        info!("Loaded reference preset '{}'", path.display());
        Ok(profile)
    }

    /// Write the preset as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!("Saved reference preset '{}'", path.display());
        Ok(())
    }

    /// Check that the preset was measured the way `config` would measure
    ///
    /// # Errors
    /// `PresetMismatch` describing the first incompatibility found
    pub fn check_compatible(&self, config: &Config) -> Result<()> {
        let mismatch = |reason: String| Err(MatchError::PresetMismatch { reason });

        if self.format_version != PRESET_FORMAT_VERSION {
            return mismatch(format!(
                "format version {} (expected {})",
                self.format_version, PRESET_FORMAT_VERSION
            ));
        }
        if self.sample_rate != config.internal_sample_rate {
            return mismatch(format!(
                "measured at {} Hz, processing at {} Hz",
                self.sample_rate, config.internal_sample_rate
            ));
        }
        if self.fft_size != config.fft_size {
            return mismatch(format!(
                "fft_size {} (configuration uses {})",
                self.fft_size, config.fft_size
            ));
        }
        let bins = config.fft_size / 2 + 1;
        if self.spectrum.bins() != bins || !self.spectrum.is_well_formed() {
            return mismatch(format!(
                "spectrum must hold {} finite, non-negative bins per channel",
                bins
            ));
        }
        if !(self.level_rms.is_finite() && self.level_rms >= 0.0)
            || !(self.match_rms.is_finite() && self.match_rms >= 0.0)
        {
            return mismatch("levels must be finite and non-negative".into());
        }
        Ok(())
    }
}

/// Where the reference characteristics come from
#[derive(Debug, Clone)]
pub enum ReferenceSource {
    /// A reference recording, analyzed on every run
    WithReference(Arc<AudioBuffer>),
    /// A stored profile
    WithPreset(PresetCurve),
}

impl ReferenceSource {
    pub fn from_buffer(buffer: AudioBuffer) -> Self {
        ReferenceSource::WithReference(Arc::new(buffer))
    }

    /// Reference recording, if there is one
    pub fn buffer(&self) -> Option<&AudioBuffer> {
        match self {
            ReferenceSource::WithReference(buffer) => Some(buffer),
            ReferenceSource::WithPreset(_) => None,
        }
    }

    /// Profile to match against
    ///
    /// # Errors
    /// `PresetMismatch` when a stored preset does not fit `config`
    pub fn profile(&self, config: &Config) -> Result<Cow<'_, ReferenceProfile>> {
        match self {
            ReferenceSource::WithReference(buffer) => {
                Ok(Cow::Owned(ReferenceProfile::analyze(buffer, config)))
            }
            ReferenceSource::WithPreset(preset) => {
                preset.check_compatible(config)?;
                Ok(Cow::Borrowed(preset))
            }
        }
    }
}
