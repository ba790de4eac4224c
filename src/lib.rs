//! refmatch - Reference Matching for Audio Mastering
//!
//! Makes a target recording sound like a reference: the target's long-term
//! frequency balance and loudness are matched to the reference, then the
//! result is finished with a lookahead limiter or peak normalization.
//!
//! # Architecture
//!
//! - `engine`: audio buffer, WAV I/O and input validation
//! - `dsp`: spectral matching, loudness matching, limiter, normalization
//! - `pipeline`: variant assembly with shared intermediates and `process`
//! - `cli`: command-line front end
//!
//! # Example
//! ```ignore
//! use refmatch::{process, Config, OutputRequest, ReferenceSource};
//!
//! let config = Config::default();
//! let reference = ReferenceSource::from_buffer(reference_buffer);
//! let requests = [OutputRequest::pcm16("master.wav")];
//! let output = process(target_buffer, &reference, &requests, &config, None)?;
//! ```

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod pipeline;

pub use config::{Config, LimiterConfig, OutputRequest, OutputSubtype};
pub use engine::AudioBuffer;
pub use error::{MatchError, Result};
pub use pipeline::{process, MatchOutput, ReferenceProfile, ReferenceSource};
