//! CLI command implementations for Hidra

use clap::{Parser, Subcommand};

use crate::error::CliResult;

pub mod inspect;
pub mod run;

/// Hidra - deterministic artificial-life simulation engine
#[derive(Parser, Debug)]
#[command(
    name = "hidra",
    version,
    about = "Deterministic artificial-life simulation engine",
    long_about = "Hidra simulates an artificial neural ecosystem driven by a gene \
                  bytecode VM. Runs are reproducible: the same genome, configuration, \
                  seeds, and input schedule give bit-identical worlds, across \
                  save/restore boundaries included."
)]
pub struct HidraCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a genome for a number of ticks
    Run(run::RunCommand),

    /// Inspect a genome or snapshot file
    Inspect(inspect::InspectCommand),
}

impl HidraCli {
    /// Execute the CLI command
    pub fn execute(self) -> CliResult<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute(),
            Commands::Inspect(cmd) => cmd.execute(),
        }
    }
}
