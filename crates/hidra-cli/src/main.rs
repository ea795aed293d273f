//! # Hidra CLI - Command Line Interface for the Hidra simulation engine
//!
//! Run genomes deterministically, inspect genome and snapshot files,
//! and resume saved worlds from the command line.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod error;

use commands::HidraCli;
use error::CliResult;

fn main() -> CliResult<()> {
    // Initialize logging with environment variable support
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Parse CLI arguments
    let cli = HidraCli::parse();

    // Execute the command
    if let Err(err) = cli.execute() {
        error!("Command failed: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
