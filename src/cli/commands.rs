//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use log::{info, warn};

use crate::config::{Config, OutputRequest};
use crate::engine::buffer::linear_to_db;
use crate::engine::io::{export_audio, import_audio};
use crate::engine::validation::validate_input;
use crate::error::{MatchError, Result};
use crate::pipeline::{process, EqMode, MatchOutput, ReferenceProfile, ReferenceSource};

/// Options of the `match` command
#[derive(Debug, Clone, Default)]
pub struct MatchOptions<'a> {
    pub reference: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub preset: Option<&'a Path>,
    pub allow_equality: bool,
}

/// Load the configuration file, or defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration: {}", path.display());
            Config::from_json_file(path)
        }
        None => Ok(Config::default()),
    }
}

/// Match a target and write every requested output.
pub fn run_match(
    target: &Path,
    outputs: &[OutputRequest],
    options: &MatchOptions<'_>,
) -> Result<MatchOutput> {
    let mut config = load_config(options.config)?;
    if options.allow_equality {
        config.allow_equality = true;
    }
    if let Some(preset) = options.preset {
        config.reference_preset = Some(preset.to_path_buf());
    }
    config.validate()?;

    let reference = match (&config.reference_preset, options.reference) {
        (Some(preset), reference) => {
            if reference.is_some() {
                warn!("Both a reference and a preset were given; using the preset");
            }
            ReferenceSource::WithPreset(ReferenceProfile::load(preset)?)
        }
        (None, Some(reference)) => {
            info!("Loading reference: {}", reference.display());
            ReferenceSource::from_buffer(import_audio(reference, config.internal_sample_rate)?)
        }
        (None, None) => {
            return Err(MatchError::InvalidConfig {
                reason: "a reference track or a preset is required".into(),
            })
        }
    };

    info!("Loading target: {}", target.display());
    let target_buffer = import_audio(target, config.internal_sample_rate)?;

    let output = process(target_buffer, &reference, outputs, &config, None)?;

    for result in &output.results {
        export_audio(&result.buffer, &result.request.path, result.request.subtype)?;
        println!(
            "Wrote {} ({:?}, peak {:.2} dBFS)",
            result.request.path.display(),
            result.request.subtype,
            linear_to_db(result.buffer.peak())
        );
    }
    for (eq, gain) in &output.loudness_gains {
        let branch = match eq {
            EqMode::Applied => "with EQ",
            EqMode::Bypassed => "without EQ",
        };
        println!("Loudness gain {}: {:+.2} dB", branch, linear_to_db(*gain));
    }

    Ok(output)
}

/// Measure a reference track and save it as a preset.
pub fn analyze_reference(reference: &Path, output: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    info!("Analyzing reference: {}", reference.display());

    let buffer = import_audio(reference, config.internal_sample_rate)?;
    validate_input(&buffer, "reference", &config)?;

    let profile = ReferenceProfile::analyze(&buffer, &config);
    profile.save(output)?;

    println!("Preset written: {}", output.display());
    println!("Loudness: {:.2} dBFS RMS", linear_to_db(profile.match_rms));

    Ok(())
}

/// Print the effective configuration.
pub fn print_config(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    println!("{}", config.to_json_string()?);
    Ok(())
}
