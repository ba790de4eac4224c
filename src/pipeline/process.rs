//! Matching entry point
//!
//! Validates inputs, resolves the reference profile, assembles every
//! requested variant and hands back finished buffers in request order.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{Config, OutputRequest};
use crate::dsp::spectral::CorrectionFilters;
use crate::engine::buffer::AudioBuffer;
use crate::engine::validation::{check_equality, report_peaks, validate_input};
use crate::error::{MatchError, Result};
use crate::pipeline::assembler::VariantAssembler;
use crate::pipeline::reference::{ReferenceProfile, ReferenceSource};
use crate::pipeline::variants::{EqMode, RequestedVariants, VariantKey};

/// A finished buffer for one output request
#[derive(Debug, Clone)]
pub struct FinishedResult {
    pub request: OutputRequest,
    pub variant: VariantKey,
    /// Shared with every other request of the same variant
    pub buffer: Arc<AudioBuffer>,
}

/// Destinations for preview clips
#[derive(Debug, Clone, Default)]
pub struct PreviewRequest {
    pub target: Option<OutputRequest>,
    pub result: Option<OutputRequest>,
}

/// Everything a preview generator needs, handed over after processing
#[derive(Debug, Clone)]
pub struct PreviewHandoff {
    /// The unprocessed target
    pub target: Arc<AudioBuffer>,
    /// Representative result: the first variant in key order
    pub result: Arc<AudioBuffer>,
    pub config: Config,
    pub target_destination: Option<PathBuf>,
    pub result_destination: Option<PathBuf>,
}

/// Outcome of a matching run
#[derive(Debug, Clone)]
pub struct MatchOutput {
    /// One entry per request, in request order
    pub results: Vec<FinishedResult>,
    /// Correction filters, when some request used the EQ
    pub filters: Option<CorrectionFilters>,
    /// Linear loudness gain per EQ branch that ran
    pub loudness_gains: BTreeMap<EqMode, f32>,
    pub preview: Option<PreviewHandoff>,
}

/// Match `target` against `reference` and produce every requested output
///
/// When `config.reference_preset` is set, a `WithReference` source is ignored
/// and the preset is loaded from that path instead.
///
/// # Errors
/// * `EmptyRequest` - If `requests` is empty
/// * `InvalidConfig` - If `config` does not validate
/// * `FileNotFound` - If the configured preset cannot be read
/// * Validation errors for either input, `IdenticalInputs` or
///   `PresetMismatch`
pub fn process(
    target: AudioBuffer,
    reference: &ReferenceSource,
    requests: &[OutputRequest],
    config: &Config,
    preview: Option<&PreviewRequest>,
) -> Result<MatchOutput> {
    if requests.is_empty() {
        return Err(MatchError::EmptyRequest);
    }
    config.validate()?;

    let configured;
    let reference = match (&config.reference_preset, reference) {
        (Some(path), ReferenceSource::WithReference(_)) => {
            warn!("Reference preset is configured; ignoring the reference recording");
            configured = ReferenceSource::WithPreset(ReferenceProfile::load(path)?);
            &configured
        }
        _ => reference,
    };

    validate_input(&target, "target", config)?;
    if let Some(reference) = reference.buffer() {
        validate_input(reference, "reference", config)?;
        if config.allow_equality {
            info!("Identical target and reference are allowed");
        } else {
            check_equality(&target, reference)?;
        }
        report_peaks(reference, "reference", config);
    }
    report_peaks(&target, "target", config);

    let profile = reference.profile(config)?;
    let variants = RequestedVariants::from_requests(requests)?;
    info!(
        "Matching {} request(s) through {} variant(s)",
        requests.len(),
        variants.len()
    );
    debug!(
        "Finishes: limited {}, unlimited {}, normalized {}",
        variants.need_default(),
        variants.need_no_limiter(),
        variants.need_no_limiter_normalized()
    );

    let target = Arc::new(target);
    let assembled = VariantAssembler::new(config, &target, &profile).assemble(&variants);
    let (buffers, filters, loudness_gains) = assembled.into_parts();

    let results = requests
        .iter()
        .map(|request| {
            let variant = VariantKey::for_request(request);
            let buffer = buffers
                .get(&variant)
                .cloned()
                .ok_or_else(|| MatchError::InvalidConfig {
                    reason: format!("no buffer was assembled for variant {}", variant),
                })?;
            Ok(FinishedResult {
                request: request.clone(),
                variant,
                buffer,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let preview = match preview {
        Some(request) if request.target.is_some() || request.result.is_some() => {
            match buffers.values().next() {
                Some(result) => Some(PreviewHandoff {
                    target: Arc::clone(&target),
                    result: Arc::clone(result),
                    config: config.clone(),
                    target_destination: request.target.as_ref().map(|r| r.path.clone()),
                    result_destination: request.result.as_ref().map(|r| r.path.clone()),
                }),
                None => {
                    warn!("No result available for the preview");
                    None
                }
            }
        }
        _ => None,
    };

    info!("Matching complete");
    Ok(MatchOutput {
        results,
        filters,
        loudness_gains,
        preview,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_stereo_test_tone;

    fn config() -> Config {
        Config {
            fft_size: 512,
            ..Config::default()
        }
    }

    #[test]
    fn test_results_follow_request_order() {
        let target = generate_stereo_test_tone(220.0, 330.0, 0.3, 0.5, 44100);
        let reference = ReferenceSource::from_buffer(generate_stereo_test_tone(
            440.0, 550.0, 0.6, 0.5, 44100,
        ));
        let requests = vec![
            OutputRequest::float32("raw.wav").with_limiter(false).with_normalize(false),
            OutputRequest::pcm16("a.wav"),
            OutputRequest::pcm24("b.wav"),
        ];

        let output = process(target, &reference, &requests, &config(), None).unwrap();
        assert_eq!(output.results.len(), 3);
        assert_eq!(output.results[0].request.path, PathBuf::from("raw.wav"));
        assert!(Arc::ptr_eq(&output.results[1].buffer, &output.results[2].buffer));
        assert!(output.preview.is_none());
    }

    #[test]
    fn test_empty_request_is_rejected_first() {
        let silent = AudioBuffer::silence(10, crate::engine::buffer::ChannelLayout::Stereo, 44100);
        let reference = ReferenceSource::from_buffer(silent.clone());
        let err = process(silent, &reference, &[], &config(), None).unwrap_err();
        assert!(matches!(err, MatchError::EmptyRequest));
    }

    #[test]
    fn test_identical_inputs() {
        let target = generate_stereo_test_tone(220.0, 330.0, 0.3, 0.5, 44100);
        let reference = ReferenceSource::from_buffer(target.clone());
        let requests = [OutputRequest::pcm16("a.wav")];

        let err = process(target.clone(), &reference, &requests, &config(), None).unwrap_err();
        assert!(matches!(err, MatchError::IdenticalInputs));

        let allowed = Config {
            allow_equality: true,
            ..config()
        };
        assert!(process(target, &reference, &requests, &allowed, None).is_ok());
    }

    #[test]
    fn test_configured_preset_replaces_reference_recording() {
        let dir = tempfile::tempdir().unwrap();
        let target = generate_stereo_test_tone(220.0, 330.0, 0.3, 0.5, 44100);
        let reference = generate_stereo_test_tone(440.0, 550.0, 0.6, 0.5, 44100);
        let requests = [OutputRequest::float32("out.wav")];

        let missing = Config {
            reference_preset: Some(dir.path().join("missing.json")),
            ..config()
        };
        // The recording is identical to the target, but it is never consulted
        let same = ReferenceSource::from_buffer(target.clone());
        let err = process(target.clone(), &same, &requests, &missing, None).unwrap_err();
        assert!(matches!(err, MatchError::FileNotFound { .. }));

        let preset = dir.path().join("preset.json");
        ReferenceProfile::analyze(&reference, &config())
            .save(&preset)
            .unwrap();
        let with_preset = Config {
            reference_preset: Some(preset),
            ..config()
        };
        let from_config = process(target.clone(), &same, &requests, &with_preset, None).unwrap();
        let from_buffer = process(
            target,
            &ReferenceSource::from_buffer(reference),
            &requests,
            &config(),
            None,
        )
        .unwrap();

        let a = &from_config.results[0].buffer;
        let b = &from_buffer.results[0].buffer;
        for ch in 0..2 {
            for (x, y) in a.channel(ch).iter().zip(b.channel(ch)) {
                assert!((x - y).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_preview_handoff() {
        let target = generate_stereo_test_tone(220.0, 330.0, 0.3, 0.5, 44100);
        let reference = ReferenceSource::from_buffer(generate_stereo_test_tone(
            440.0, 550.0, 0.6, 0.5, 44100,
        ));
        let requests = [
            OutputRequest::pcm16("norm.wav").with_limiter(false),
            OutputRequest::pcm16("limited.wav"),
        ];
        let preview = PreviewRequest {
            target: None,
            result: Some(OutputRequest::pcm16("preview.wav")),
        };

        let output =
            process(target.clone(), &reference, &requests, &config(), Some(&preview)).unwrap();
        let handoff = output.preview.unwrap();
        // The limited variant comes first in key order
        assert!(Arc::ptr_eq(&handoff.result, &output.results[1].buffer));
        assert_eq!(*handoff.target, target);
        assert_eq!(handoff.result_destination, Some(PathBuf::from("preview.wav")));
        assert!(handoff.target_destination.is_none());
    }
}
