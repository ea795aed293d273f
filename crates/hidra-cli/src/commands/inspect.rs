//! Inspect genome and snapshot files
//!
//! Example:
//!   hidra inspect --genome colony.hgn
//!   hidra inspect --snapshot colony.hsnap

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use hidra_genome::Genome;
use hidra_world::WorldSnapshot;

use crate::error::{CliError, CliResult};

#[derive(Debug, Serialize)]
struct GeneReport {
    id: usize,
    bytes: usize,
    instructions: usize,
}

#[derive(Debug, Serialize)]
struct GenomeReport {
    total_bytes: usize,
    genes: Vec<GeneReport>,
}

#[derive(Debug, Serialize)]
struct SnapshotReport {
    version: u32,
    current_tick: u64,
    experiment_id: Option<String>,
    genome_bytes: usize,
    neurons: usize,
    synapses: usize,
    inputs: usize,
    outputs: usize,
    queued_events: usize,
}

#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Genome file to inspect
    #[arg(long, required_unless_present = "snapshot")]
    pub genome: Option<PathBuf>,

    /// Snapshot file to inspect
    #[arg(long, conflicts_with = "genome")]
    pub snapshot: Option<PathBuf>,
}

impl InspectCommand {
    /// Execute the inspect command
    pub fn execute(self) -> CliResult<()> {
        if let Some(path) = &self.genome {
            let bytes = std::fs::read(path)
                .map_err(|err| CliError::io(path.display().to_string(), err))?;
            let genome = Genome::compile(&bytes)?;
            let report = GenomeReport {
                total_bytes: bytes.len(),
                genes: genome
                    .genes()
                    .map(|gene| GeneReport {
                        id: gene.id,
                        bytes: gene.byte_len,
                        instructions: gene.instructions.len(),
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?
            );
            return Ok(());
        }

        let path = self
            .snapshot
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("either --genome or --snapshot is required"))?;
        let bytes =
            std::fs::read(path).map_err(|err| CliError::io(path.display().to_string(), err))?;
        let snapshot = WorldSnapshot::from_bytes(&bytes)?;
        let report = SnapshotReport {
            version: snapshot.version,
            current_tick: snapshot.current_tick,
            experiment_id: snapshot.experiment_id.clone(),
            genome_bytes: snapshot.genome.len(),
            neurons: snapshot.neurons.len(),
            synapses: snapshot.synapses.len(),
            inputs: snapshot.inputs.len(),
            outputs: snapshot.outputs.len(),
            queued_events: snapshot.event_queue.len(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?
        );
        Ok(())
    }
}
