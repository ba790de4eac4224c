//! Integration Tests
//!
//! End-to-end tests for the file-based workflow: load, match, export,
//! presets and error reporting.

use std::path::Path;

use hound::{SampleFormat, WavReader};
use refmatch::cli::commands::{analyze_reference, print_config, run_match, MatchOptions};
use refmatch::cli::parse_output_request;
use refmatch::config::{Config, OutputRequest, OutputSubtype};
use refmatch::engine::{export_audio, generate_stereo_test_tone, import_audio, AudioBuffer};
use tempfile::tempdir;

/// Helper to write a stereo tone mix as 16-bit WAV
fn write_mix(path: &Path, low: f32, high: f32, level: f32, duration_secs: f32, sample_rate: u32) {
    let a = generate_stereo_test_tone(low, low * 1.5, level, duration_secs, sample_rate);
    let b = generate_stereo_test_tone(high, high * 1.25, level * 0.5, duration_secs, sample_rate);
    let left: Vec<f32> = a.channel(0).iter().zip(b.channel(0)).map(|(x, y)| x + y).collect();
    let right: Vec<f32> = a.channel(1).iter().zip(b.channel(1)).map(|(x, y)| x + y).collect();
    let mix = AudioBuffer::from_channels(left, right, sample_rate).unwrap();
    export_audio(&mix, path, OutputSubtype::Pcm16).unwrap();
}

// === Full Pipeline Tests ===

#[test]
fn test_match_writes_every_output() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.wav");
    let reference = dir.path().join("reference.wav");
    write_mix(&target, 110.0, 2000.0, 0.2, 2.0, 44100);
    write_mix(&reference, 220.0, 5000.0, 0.6, 2.0, 44100);

    let outputs = vec![
        OutputRequest::pcm16(dir.path().join("master_16.wav")),
        OutputRequest::pcm24(dir.path().join("master_24.wav")).with_limiter(false),
        OutputRequest::float32(dir.path().join("raw.wav"))
            .with_limiter(false)
            .with_normalize(false)
            .with_no_eq(true),
    ];
    let options = MatchOptions {
        reference: Some(reference.as_path()),
        ..MatchOptions::default()
    };

    let output = run_match(&target, &outputs, &options).unwrap();
    assert_eq!(output.results.len(), 3);

    for (request, bits, format) in [
        (&outputs[0], 16, SampleFormat::Int),
        (&outputs[1], 24, SampleFormat::Int),
        (&outputs[2], 32, SampleFormat::Float),
    ] {
        let reader = WavReader::open(&request.path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, bits);
        assert_eq!(spec.sample_format, format);
        assert_eq!(reader.duration(), 2 * 44100);
    }

    let limited = import_audio(&outputs[0].path, 44100).unwrap();
    let ceiling = refmatch::engine::db_to_linear(Config::default().limiter.ceiling_db);
    // 16-bit quantization may round up by half a step
    assert!(limited.peak() <= ceiling + 1.0 / 32767.0);
}

#[test]
fn test_match_resamples_and_upmixes_inputs() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target_48k.wav");
    let reference = dir.path().join("reference_mono.wav");
    write_mix(&target, 110.0, 2000.0, 0.2, 1.0, 48000);
    let mono = AudioBuffer::mono(
        generate_stereo_test_tone(330.0, 330.0, 0.5, 1.0, 44100)
            .channel(0)
            .to_vec(),
        44100,
    );
    export_audio(&mono, &reference, OutputSubtype::Pcm16).unwrap();

    let out = dir.path().join("out.wav");
    let options = MatchOptions {
        reference: Some(reference.as_path()),
        ..MatchOptions::default()
    };
    run_match(&target, &[OutputRequest::pcm16(&out)], &options).unwrap();

    let written = import_audio(&out, 44100).unwrap();
    assert_eq!(written.len(), 44100);
}

#[test]
fn test_identical_files_write_nothing() {
    let dir = tempdir().unwrap();
    let track = dir.path().join("track.wav");
    write_mix(&track, 110.0, 2000.0, 0.3, 1.0, 44100);
    let out = dir.path().join("out.wav");
    let options = MatchOptions {
        reference: Some(track.as_path()),
        ..MatchOptions::default()
    };

    let err = run_match(&track, &[OutputRequest::pcm16(&out)], &options).unwrap_err();
    assert_eq!(err.error_code(), "IDENTICAL_INPUTS");
    assert!(!out.exists());

    let allowed = MatchOptions {
        allow_equality: true,
        ..options
    };
    run_match(&track, &[OutputRequest::pcm16(&out)], &allowed).unwrap();
    assert!(out.exists());
}

#[test]
fn test_missing_reference_and_preset() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.wav");
    write_mix(&target, 110.0, 2000.0, 0.3, 1.0, 44100);

    let err = run_match(
        &target,
        &[OutputRequest::pcm16(dir.path().join("out.wav"))],
        &MatchOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CONFIG");
}

#[test]
fn test_missing_target_file() {
    let dir = tempdir().unwrap();
    let reference = dir.path().join("reference.wav");
    write_mix(&reference, 220.0, 5000.0, 0.6, 1.0, 44100);
    let options = MatchOptions {
        reference: Some(reference.as_path()),
        ..MatchOptions::default()
    };

    let err = run_match(
        &dir.path().join("missing.wav"),
        &[OutputRequest::pcm16(dir.path().join("out.wav"))],
        &options,
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    assert!(err.is_recoverable());
}

// === Preset Tests ===

#[test]
fn test_preset_workflow() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.wav");
    let reference = dir.path().join("reference.wav");
    let preset = dir.path().join("reference.json");
    write_mix(&target, 110.0, 2000.0, 0.2, 2.0, 44100);
    write_mix(&reference, 220.0, 5000.0, 0.6, 2.0, 44100);

    analyze_reference(&reference, &preset, None).unwrap();
    assert!(preset.exists());

    let with_preset = dir.path().join("with_preset.wav");
    let with_reference = dir.path().join("with_reference.wav");
    run_match(
        &target,
        &[OutputRequest::float32(&with_preset)],
        &MatchOptions {
            preset: Some(preset.as_path()),
            ..MatchOptions::default()
        },
    )
    .unwrap();
    run_match(
        &target,
        &[OutputRequest::float32(&with_reference)],
        &MatchOptions {
            reference: Some(reference.as_path()),
            ..MatchOptions::default()
        },
    )
    .unwrap();

    let a = import_audio(&with_preset, 44100).unwrap();
    let b = import_audio(&with_reference, 44100).unwrap();
    for ch in 0..2 {
        for (x, y) in a.channel(ch).iter().zip(b.channel(ch)) {
            assert!((x - y).abs() < 1e-4);
        }
    }
}

#[test]
fn test_preset_from_other_configuration_is_rejected() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.wav");
    let reference = dir.path().join("reference.wav");
    let preset = dir.path().join("reference.json");
    let config = dir.path().join("config.json");
    write_mix(&target, 110.0, 2000.0, 0.2, 1.0, 44100);
    write_mix(&reference, 220.0, 5000.0, 0.6, 1.0, 44100);
    std::fs::write(&config, r#"{ "fft_size": 1024 }"#).unwrap();

    analyze_reference(&reference, &preset, Some(config.as_path())).unwrap();

    let err = run_match(
        &target,
        &[OutputRequest::pcm16(dir.path().join("out.wav"))],
        &MatchOptions {
            preset: Some(preset.as_path()),
            ..MatchOptions::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "PRESET_MISMATCH");
}

// === Configuration Tests ===

#[test]
fn test_config_file_is_applied() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.wav");
    let reference = dir.path().join("reference.wav");
    let config = dir.path().join("config.json");
    write_mix(&target, 110.0, 2000.0, 0.2, 1.0, 44100);
    write_mix(&reference, 220.0, 5000.0, 0.6, 1.0, 44100);
    std::fs::write(
        &config,
        r#"{ "fft_size": 2048, "limiter": { "ceiling_db": -3.0 } }"#,
    )
    .unwrap();

    let output = run_match(
        &target,
        &[OutputRequest::float32(dir.path().join("out.wav"))],
        &MatchOptions {
            reference: Some(reference.as_path()),
            config: Some(config.as_path()),
            ..MatchOptions::default()
        },
    )
    .unwrap();

    assert_eq!(output.filters.unwrap().mid.len(), 2048);
    assert!(output.results[0].buffer.peak() <= refmatch::engine::db_to_linear(-3.0));
}

#[test]
fn test_invalid_config_file() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{ "fft_size": 1000 }"#).unwrap();
    assert_eq!(
        print_config(Some(config.as_path())).unwrap_err().error_code(),
        "INVALID_CONFIG"
    );
    assert!(print_config(None).is_ok());
}

#[test]
fn test_output_spec_parsing_round_trip() {
    let request = parse_output_request("out/master.wav:pcm24:no-normalize").unwrap();
    assert_eq!(request.subtype, OutputSubtype::Pcm24);
    assert!(request.use_limiter);
    assert!(!request.normalize);
}
