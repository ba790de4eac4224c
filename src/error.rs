//! Error handling for refmatch
//!
//! Every fatal condition carries an error code and recovery suggestions.
//! Numeric guard conditions (near-zero spectra, silent references) are
//! handled where they occur and never surface here.

use thiserror::Error;

/// Result type alias for refmatch operations
pub type Result<T> = std::result::Result<T, MatchError>;

/// Main error type for refmatch operations
#[derive(Error, Debug)]
pub enum MatchError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Validation Errors
    #[error("The {which} sample rate is {found} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        which: &'static str,
        found: u32,
        expected: u32,
    },

    #[error("The {which} has {found} channels, expected 2")]
    ChannelCount { which: &'static str, found: usize },

    #[error("The {which} is too short: {length} samples (must exceed fft size {fft_size})")]
    TooShort {
        which: &'static str,
        length: usize,
        fft_size: usize,
    },

    #[error("The {which} is too long: {duration_secs:.1}s (maximum {max_secs:.1}s)")]
    TooLong {
        which: &'static str,
        duration_secs: f64,
        max_secs: f64,
    },

    #[error("Target and reference are identical")]
    IdenticalInputs,

    #[error("Preset does not match the configuration: {reason}")]
    PresetMismatch { reason: String },

    // Request Errors
    #[error("The result list is empty")]
    EmptyRequest,

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MatchError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MatchError::FileNotFound { .. } => "FILE_NOT_FOUND",
            MatchError::InvalidAudio { .. } => "INVALID_AUDIO",
            MatchError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            MatchError::SampleRateMismatch { .. } => "SAMPLE_RATE_MISMATCH",
            MatchError::ChannelCount { .. } => "CHANNEL_COUNT",
            MatchError::TooShort { .. } => "TOO_SHORT",
            MatchError::TooLong { .. } => "TOO_LONG",
            MatchError::IdenticalInputs => "IDENTICAL_INPUTS",
            MatchError::PresetMismatch { .. } => "PRESET_MISMATCH",
            MatchError::EmptyRequest => "EMPTY_REQUEST",
            MatchError::InvalidConfig { .. } => "INVALID_CONFIG",
            MatchError::Io(_) => "IO_ERROR",
            MatchError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check whether this error was raised by input validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MatchError::SampleRateMismatch { .. }
                | MatchError::ChannelCount { .. }
                | MatchError::TooShort { .. }
                | MatchError::TooLong { .. }
                | MatchError::IdenticalInputs
                | MatchError::PresetMismatch { .. }
        )
    }

    /// Check if the user can fix this error by changing inputs or settings
    pub fn is_recoverable(&self) -> bool {
        match self {
            MatchError::FileNotFound { .. } => true,
            MatchError::InvalidAudio { .. } => true,
            MatchError::UnsupportedFormat { .. } => true,
            MatchError::EmptyRequest => true,
            MatchError::InvalidConfig { .. } => true,
            e => e.is_validation(),
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MatchError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            MatchError::InvalidAudio { .. } => vec![
                "Try converting the file to WAV format first",
                "The file may be corrupted - try re-exporting from source",
            ],
            MatchError::UnsupportedFormat { .. } => vec![
                "Convert to a mono or stereo WAV file",
                "Supported sample formats: 8/16/24/32-bit integer, 32-bit float",
            ],
            MatchError::SampleRateMismatch { .. } => vec![
                "Resample the file to the internal sample rate",
                "Or change internal_sample_rate in the configuration",
            ],
            MatchError::ChannelCount { .. } => vec!["Convert the file to stereo"],
            MatchError::TooShort { .. } => vec![
                "Use a longer recording",
                "Or lower fft_size in the configuration",
            ],
            MatchError::TooLong { .. } => vec![
                "Trim the recording",
                "Or raise max_length_secs in the configuration",
            ],
            MatchError::IdenticalInputs => vec![
                "Choose a different reference track",
                "Pass --allow-equality if this is intentional",
            ],
            MatchError::PresetMismatch { .. } => vec![
                "Re-create the preset with the current configuration",
                "Run 'refmatch-cli analyze-reference' on the reference track",
            ],
            MatchError::EmptyRequest => vec!["Request at least one output"],
            MatchError::InvalidConfig { .. } => vec![
                "Run 'refmatch-cli print-config' to see valid defaults",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = MatchError::FileNotFound {
            path: "test.wav".to_string(),
            source: None,
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(MatchError::EmptyRequest.error_code(), "EMPTY_REQUEST");
    }

    #[test]
    fn test_validation_classification() {
        let err = MatchError::ChannelCount {
            which: "target",
            found: 6,
        };
        assert!(err.is_validation());
        assert!(err.is_recoverable());
        assert!(!MatchError::EmptyRequest.is_validation());
    }

    #[test]
    fn test_recovery_suggestions() {
        assert!(!MatchError::IdenticalInputs.recovery_suggestions().is_empty());
        let io = MatchError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(io.recovery_suggestions().is_empty());
        assert!(!io.is_recoverable());
    }

    #[test]
    fn test_messages_name_the_input() {
        let err = MatchError::SampleRateMismatch {
            which: "reference",
            found: 48000,
            expected: 44100,
        };
        let text = err.to_string();
        assert!(text.contains("reference"));
        assert!(text.contains("48000"));
    }
}
