//! Run a genome for a number of ticks
//!
//! Example:
//!   hidra run --genome colony.hgn --ticks 500 --inputs 100,101 --outputs 200 \
//!             --schedule inputs.json --snapshot-out colony.hsnap

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::info;

use hidra_world::{World, WorldSnapshot};

use crate::config::load_world_config;
use crate::error::{CliError, CliResult};

/// One entry of the input schedule file: values applied from `tick`
/// onward until the next entry takes over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// First tick the values apply to
    pub tick: u64,
    /// Input values keyed by raw input node id
    pub values: BTreeMap<u64, f32>,
}

/// Summary printed as JSON after the run.
#[derive(Debug, Serialize)]
struct RunSummary {
    ticks_run: u64,
    final_tick: u64,
    neurons: usize,
    active_neurons: usize,
    synapses: usize,
    outputs: Vec<(u64, f32)>,
    metrics_samples: u64,
    peak_active_neurons: usize,
}

#[derive(Args, Debug)]
pub struct RunCommand {
    /// Genome file (raw gene bytecode with GN separators)
    #[arg(long, required_unless_present = "resume")]
    pub genome: Option<PathBuf>,

    /// Snapshot file to resume instead of starting fresh
    #[arg(long, conflicts_with = "genome")]
    pub resume: Option<PathBuf>,

    /// World configuration TOML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(short, long, default_value = "100")]
    pub ticks: u64,

    /// Declared input node ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub inputs: Vec<u64>,

    /// Declared output node ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub outputs: Vec<u64>,

    /// JSON input schedule file
    #[arg(long)]
    pub schedule: Option<PathBuf>,

    /// Write a snapshot here after the run
    #[arg(long)]
    pub snapshot_out: Option<PathBuf>,
}

impl RunCommand {
    /// Execute the run command
    pub fn execute(self) -> CliResult<()> {
        let mut world = self.build_world()?;
        let schedule = self.load_schedule()?;

        info!(
            "Running {} ticks from tick {}",
            self.ticks,
            world.current_tick()
        );

        let mut cursor = 0usize;
        for _ in 0..self.ticks {
            let tick = world.current_tick();
            while cursor < schedule.len() && schedule[cursor].tick <= tick {
                world.set_input_values(&schedule[cursor].values);
                cursor += 1;
            }
            world.step()?;
        }

        let summary = self.summarize(&world);
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).map_err(anyhow::Error::from)?
        );

        if let Some(path) = &self.snapshot_out {
            let bytes = world.snapshot().to_bytes()?;
            std::fs::write(path, bytes)
                .map_err(|err| CliError::io(path.display().to_string(), err))?;
            info!("Snapshot written to {}", path.display());
        }
        Ok(())
    }

    fn build_world(&self) -> CliResult<World> {
        if let Some(path) = &self.resume {
            let bytes = std::fs::read(path)
                .map_err(|err| CliError::io(path.display().to_string(), err))?;
            let snapshot = WorldSnapshot::from_bytes(&bytes)?;
            info!("Resuming snapshot at tick {}", snapshot.current_tick);
            return Ok(World::restore(snapshot)?);
        }

        let genome_path = self
            .genome
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("either --genome or --resume is required"))?;
        let genome = std::fs::read(genome_path)
            .map_err(|err| CliError::io(genome_path.display().to_string(), err))?;
        let config = load_world_config(self.config.as_deref())?;
        Ok(World::new(config, &genome, &self.inputs, &self.outputs)?)
    }

    fn load_schedule(&self) -> CliResult<Vec<ScheduleEntry>> {
        let Some(path) = &self.schedule else {
            return Ok(Vec::new());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|err| CliError::io(path.display().to_string(), err))?;
        let mut entries: Vec<ScheduleEntry> = serde_json::from_str(&text)
            .map_err(|err| CliError::invalid_file("schedule", path.display().to_string(), err))?;
        entries.sort_by_key(|entry| entry.tick);
        Ok(entries)
    }

    fn summarize(&self, world: &World) -> RunSummary {
        let neurons = world.neurons();
        let summary = world.metrics().summary();
        RunSummary {
            ticks_run: self.ticks,
            final_tick: world.current_tick(),
            neurons: neurons.len(),
            active_neurons: neurons.iter().filter(|n| n.active).count(),
            synapses: world.synapses().len(),
            outputs: world.output_values(),
            metrics_samples: summary.samples_taken,
            peak_active_neurons: summary.peak_active_neurons,
        }
    }
}
