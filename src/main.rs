//! refmatch CLI - Reference Matching
//!
//! Command-line interface for the refmatch mastering pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info};

use refmatch::cli::commands::{self, MatchOptions};
use refmatch::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("refmatch v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("refmatch v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Match {
            target,
            reference,
            outputs,
            config,
            preset,
            allow_equality,
        } => {
            let options = MatchOptions {
                reference: reference.as_deref(),
                config: config.as_deref(),
                preset: preset.as_deref(),
                allow_equality,
            };
            commands::run_match(&target, &outputs, &options)
                .map(|_| ())
                .map_err(|e| {
                    for suggestion in e.recovery_suggestions() {
                        error!("hint: {}", suggestion);
                    }
                    e
                })
                .with_context(|| format!("Failed to match '{}'", target.display()))
        }
        Commands::AnalyzeReference {
            reference,
            output,
            config,
        } => commands::analyze_reference(&reference, &output, config.as_deref())
            .with_context(|| format!("Failed to analyze '{}'", reference.display())),
        Commands::PrintConfig { config } => {
            commands::print_config(config.as_deref()).context("Failed to load configuration")
        }
    }
}
