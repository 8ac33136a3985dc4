// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "halyard")]
#[command(about = "Sequential build-push-deploy pipelines in containers")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result (for CI)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a halyard.yml template in the current directory
    Init {
        /// Pipeline name
        #[arg(long)]
        pipeline: Option<String>,

        /// Overwrite an existing halyard.yml
        #[arg(long)]
        force: bool,
    },

    /// Resolve configuration and run the pipeline
    Run {
        /// Pipeline file (default: discovered in the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the rendered commands without running anything
        #[arg(long)]
        dry_run: bool,

        /// Run only this stage
        #[arg(long)]
        stage: Option<String>,

        /// Override a configuration value (key=value), repeatable
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Also write the JSON summary to this file
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
}
