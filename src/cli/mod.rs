//! CLI Module
//!
//! Command-line interface for reference matching.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{OutputRequest, OutputSubtype};

/// Reference matching - master a track to sound like another one
#[derive(Parser, Debug)]
#[command(name = "refmatch-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Match a target to a reference recording or preset
    #[command(name = "match")]
    Match {
        /// Track to be mastered
        #[arg(short, long)]
        target: PathBuf,

        /// Reference track (not needed with --preset)
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Output: PATH[:pcm16|pcm24|float][:no-limiter][:no-normalize][:no-eq]
        #[arg(short, long = "output", required = true, value_parser = parse_output_request)]
        outputs: Vec<OutputRequest>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Reference preset created by analyze-reference
        #[arg(long)]
        preset: Option<PathBuf>,

        /// Allow the target and reference to be the same recording
        #[arg(long)]
        allow_equality: bool,
    },

    /// Measure a reference track and store it as a preset
    #[command(name = "analyze-reference")]
    AnalyzeReference {
        /// Reference track
        #[arg(short, long)]
        reference: PathBuf,

        /// Preset file to write
        #[arg(short, long)]
        output: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration as JSON
    #[command(name = "print-config")]
    PrintConfig {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Parse `PATH[:subtype][:flag...]` into an output request
///
/// Options are only recognised at the end, so paths containing `:` still work.
pub fn parse_output_request(spec: &str) -> std::result::Result<OutputRequest, String> {
    let mut parts: Vec<&str> = spec.split(':').collect();
    let mut request = OutputRequest::pcm16(PathBuf::new());
    let mut subtype: Option<OutputSubtype> = None;

    while parts.len() > 1 {
        let Some(&option) = parts.last() else { break };
        match option.to_ascii_lowercase().as_str() {
            "pcm16" | "pcm24" | "float" | "float32" if subtype.is_some() => {
                return Err(format!("more than one sample format in '{}'", spec));
            }
            "pcm16" => subtype = Some(OutputSubtype::Pcm16),
            "pcm24" => subtype = Some(OutputSubtype::Pcm24),
            "float" | "float32" => subtype = Some(OutputSubtype::Float32),
            "no-limiter" => request.use_limiter = false,
            "no-normalize" => request.normalize = false,
            "no-eq" => request.no_eq = true,
            _ => break,
        }
        parts.pop();
    }

    let path = parts.join(":");
    if path.is_empty() {
        return Err(format!("missing output path in '{}'", spec));
    }
    request.path = PathBuf::from(path);
    request.subtype = subtype.unwrap_or_default();
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_plain_path() {
        let request = parse_output_request("out.wav").unwrap();
        assert_eq!(request, OutputRequest::pcm16("out.wav"));
    }

    #[test]
    fn test_parse_options() {
        let request = parse_output_request("mix/out.wav:pcm24:no-limiter:no-eq").unwrap();
        assert_eq!(request.path, PathBuf::from("mix/out.wav"));
        assert_eq!(request.subtype, OutputSubtype::Pcm24);
        assert!(!request.use_limiter);
        assert!(request.normalize);
        assert!(request.no_eq);

        let request = parse_output_request("raw.wav:no-normalize:no-limiter:float").unwrap();
        assert_eq!(request.subtype, OutputSubtype::Float32);
        assert!(!request.normalize);
    }

    #[test]
    fn test_parse_path_with_colon() {
        let request = parse_output_request("C:\\masters\\out.wav:pcm16").unwrap();
        assert_eq!(request.path, PathBuf::from("C:\\masters\\out.wav"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_output_request(":pcm16").is_err());
        assert!(parse_output_request("out.wav:pcm16:float").is_err());
    }

    #[test]
    fn test_parse_match_command() {
        let cli = Cli::try_parse_from([
            "refmatch-cli",
            "match",
            "--target",
            "t.wav",
            "--reference",
            "r.wav",
            "-o",
            "a.wav",
            "-o",
            "b.wav:float:no-limiter",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Match { outputs, .. }) => {
                assert_eq!(outputs.len(), 2);
                assert_eq!(outputs[1].subtype, OutputSubtype::Float32);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
