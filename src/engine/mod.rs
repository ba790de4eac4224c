//! Audio Engine Module
//!
//! Core audio plumbing shared by every stage:
//! - Audio buffer type and level helpers
//! - WAV import and export
//! - Input validation

pub mod buffer;
pub mod io;
pub mod validation;

pub use buffer::{db_to_linear, linear_to_db, AudioBuffer, ChannelLayout, DEFAULT_SAMPLE_RATE};
pub use io::{export_audio, generate_stereo_test_tone, import_audio};
pub use validation::{
    check_equality, inspect_peaks, report_peaks, validate_input, PeakCondition, PeakInspection,
};
