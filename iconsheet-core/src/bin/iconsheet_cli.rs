//! Iconsheet CLI
//!
//! Commands: build, palette
//! Outputs JSON to stdout, logs to stderr
//! Returns non-zero when a stage fails

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use iconsheet_core::{load_palette, FileManifest, IconPipeline, IconsheetConfig, RunOutcome};

#[derive(Parser)]
#[command(name = "iconsheet-cli")]
#[command(about = "Iconsheet CLI - SVG icons to inline and fallback stylesheets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build stylesheets from an icon directory
    Build {
        /// Icon source directory
        #[arg(short, long)]
        src: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Icon files to use instead of every icon under the source directory
        files: Vec<PathBuf>,
    },

    /// Print the resolved color palette
    Palette,
}

fn init_logging(verbose: bool, json_format: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn failure(error: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": error.to_string(),
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = match &cli.config {
        Some(path) => match IconsheetConfig::from_json_file(path) {
            Ok(c) => c,
            Err(e) => {
                println!("{}", failure(e));
                return ExitCode::FAILURE;
            }
        },
        None => IconsheetConfig::default(),
    };

    match cli.command {
        Commands::Palette => {
            let palette = load_palette(&config.colors, config.stylesheet.as_deref(), &config.lessprefix);
            match serde_json::to_string_pretty(&palette) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!("{}", failure(e));
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Build { src, dest, files } => {
            // Command line wins over the config file
            let config = IconsheetConfig {
                src: src.or(config.src),
                dest: dest.or(config.dest),
                ..config
            };

            let manifest = if !files.is_empty() {
                FileManifest::from_paths(files)
            } else if let Some(src) = &config.src {
                FileManifest::discover(src)
            } else {
                println!("{}", failure("No source directory or icon files given"));
                return ExitCode::FAILURE;
            };

            let pipeline = IconPipeline::new(config);
            match pipeline.run(&manifest) {
                Ok(RunOutcome::NothingToProcess) => {
                    let output = serde_json::json!({
                        "success": true,
                        "report": null,
                    });
                    println!("{}", output);
                    ExitCode::SUCCESS
                }
                Ok(RunOutcome::Completed(report)) => {
                    let output = serde_json::json!({
                        "success": true,
                        "report": report,
                    });
                    match serde_json::to_string_pretty(&output) {
                        Ok(json) => {
                            println!("{}", json);
                            ExitCode::SUCCESS
                        }
                        Err(e) => {
                            println!("{}", failure(e));
                            ExitCode::FAILURE
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Build failed");
                    println!("{}", failure(e));
                    ExitCode::from(2) // Stage failure
                }
            }
        }
    }
}
