// ABOUTME: Entry point for the halyard CLI application.
// ABOUTME: Parses arguments, sets up logging, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use halyard::error::Result;
use halyard::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG applies unless --verbose asks for everything
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);
    output.start_timer();

    if let Err(e) = run(cli.command, &output).await {
        output.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(command: Commands, output: &Output) -> Result<()> {
    match command {
        Commands::Init { pipeline, force } => commands::init(pipeline.as_deref(), force, output),
        Commands::Run {
            config,
            dry_run,
            stage,
            set,
            report,
        } => {
            let args = commands::RunArgs {
                config,
                dry_run,
                stage,
                set,
                report,
            };
            commands::run(args, output).await
        }
    }
}
