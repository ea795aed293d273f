//! World snapshot and restore
//!
//! A snapshot carries everything needed to resume bit-identically:
//! configuration, tick, hormones, genome bytes, entity collections,
//! the event queue, id counters, and both PRNG states. Caches are not
//! serialized; restore recompiles the genome and rebuilds them.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use hidra_genome::Genome;

use crate::config::WorldConfig;
use crate::error::{Result, WorldError};
use crate::event::{Event, EventQueue};
use crate::metrics::MetricsRing;
use crate::neuron::Neuron;
use crate::rng::WorldRng;
use crate::spatial::SpatialIndex;
use crate::synapse::Synapse;
use crate::world::{World, HORMONE_COUNT};

/// Snapshot format version, bumped on layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable world state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Format version
    pub version: u32,
    /// Configuration the world was built with
    pub config: WorldConfig,
    /// Tick the world will execute next
    pub current_tick: u64,
    /// Experiment tag, if any
    pub experiment_id: Option<String>,
    /// Raw genome byte stream
    pub genome: Vec<u8>,
    /// Global hormone vector
    pub hormones: Vec<f32>,
    /// Neurons in id order
    pub neurons: Vec<Neuron>,
    /// Synapses in id order
    pub synapses: Vec<Synapse>,
    /// Input node values keyed by raw id
    pub inputs: BTreeMap<u64, f32>,
    /// Output node values keyed by raw id
    pub outputs: BTreeMap<u64, f32>,
    /// Pending events in `(execute_at, id)` order
    pub event_queue: Vec<Event>,
    /// Next neuron id
    pub next_neuron_id: u64,
    /// Next synapse id
    pub next_synapse_id: u64,
    /// Next event id
    pub next_event_id: u64,
    /// Primary PRNG state
    pub rng_state: (u64, u64),
    /// Metrics PRNG state
    pub metrics_rng_state: (u64, u64),
}

impl WorldSnapshot {
    /// Serialize to the binary blob format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|err| WorldError::snapshot(err.to_string()))
    }

    /// Deserialize from the binary blob format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: WorldSnapshot =
            bincode::deserialize(bytes).map_err(|err| WorldError::snapshot(err.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(WorldError::snapshot(format!(
                "unsupported snapshot version {} (supported: {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

impl World {
    /// Capture a snapshot of the observable state.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            current_tick: self.current_tick,
            experiment_id: self.experiment_id.clone(),
            genome: self.genome.bytes().to_vec(),
            hormones: self.hormones.clone(),
            neurons: self.neurons.values().cloned().collect(),
            synapses: self.synapses.values().cloned().collect(),
            inputs: self.inputs.iter().map(|(id, &v)| (id.raw(), v)).collect(),
            outputs: self.outputs.iter().map(|(id, &v)| (id.raw(), v)).collect(),
            event_queue: self.event_queue.to_sorted_vec(),
            next_neuron_id: self.next_neuron_id,
            next_synapse_id: self.next_synapse_id,
            next_event_id: self.next_event_id,
            rng_state: self.rng.state(),
            metrics_rng_state: self.metrics_rng.state(),
        }
    }

    /// Rebuild a world from a snapshot.
    ///
    /// Recompiles genes from the embedded genome, re-seeds both PRNGs,
    /// re-sorts the entity collections, rebuilds the spatial index and
    /// derived caches, and seeds every synapse's previous source value
    /// from its current source. The restored world resumes at the saved
    /// tick with the same identity space; it does not inherit the
    /// original's event history, log sink, or metrics ring.
    pub fn restore(snapshot: WorldSnapshot) -> Result<Self> {
        snapshot.config.validate()?;
        if snapshot.hormones.len() != HORMONE_COUNT {
            return Err(WorldError::snapshot(format!(
                "hormone vector has length {}, expected {HORMONE_COUNT}",
                snapshot.hormones.len()
            )));
        }
        let genome = Genome::compile(&snapshot.genome)?;

        let mut rng = WorldRng::from_seed(snapshot.config.seed0, snapshot.config.seed1);
        rng.set_state(snapshot.rng_state.0, snapshot.rng_state.1);
        let mut metrics_rng = WorldRng::from_seed(snapshot.config.seed0, snapshot.config.seed1);
        metrics_rng.set_state(snapshot.metrics_rng_state.0, snapshot.metrics_rng_state.1);

        let spatial = SpatialIndex::new(2.0 * snapshot.config.competition_radius);
        let metrics = MetricsRing::new(snapshot.config.metrics_ring_capacity);

        let neurons: BTreeMap<_, _> = snapshot
            .neurons
            .into_iter()
            .map(|mut neuron| {
                // Owned lists re-sort defensively; the invariant is
                // maintained live but a snapshot is external input
                neuron.owned_synapses.sort();
                (neuron.id, neuron)
            })
            .collect();
        let synapses: BTreeMap<_, _> = snapshot
            .synapses
            .into_iter()
            .map(|synapse| (synapse.id, synapse))
            .collect();

        let mut world = World {
            config: snapshot.config,
            current_tick: snapshot.current_tick,
            experiment_id: snapshot.experiment_id,
            genome,
            neurons,
            synapses,
            inputs: snapshot
                .inputs
                .into_iter()
                .map(|(id, v)| (crate::ids::InputId::new(id), v))
                .collect(),
            outputs: snapshot
                .outputs
                .into_iter()
                .map(|(id, v)| (crate::ids::OutputId::new(id), v))
                .collect(),
            hormones: snapshot.hormones,
            event_queue: EventQueue::from(snapshot.event_queue),
            next_neuron_id: snapshot.next_neuron_id,
            next_synapse_id: snapshot.next_synapse_id,
            next_event_id: snapshot.next_event_id,
            rng,
            metrics_rng,
            halted: None,
            topo_order: Vec::new(),
            incoming: BTreeMap::new(),
            input_driven: BTreeMap::new(),
            spatial,
            caches_dirty: true,
            current_pulses: Vec::new(),
            current_others: Vec::new(),
            next_tick_events: Vec::new(),
            history: Arc::new(RwLock::new(BTreeMap::new())),
            metrics,
            log_sink: None,
        };

        // Seed temporal-condition history from current source values
        let seeds: Vec<(crate::ids::SynapseId, f32)> = world
            .synapses
            .values()
            .map(|s| (s.id, world.entity_value(s.source)))
            .collect();
        for (synapse_id, value) in seeds {
            if let Some(synapse) = world.synapses.get_mut(&synapse_id) {
                synapse.previous_source_value = value;
            }
        }

        world.rebuild_caches();
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{InputId, NeuronId, NodeRef};
    use crate::synapse::SignalType;

    fn world() -> World {
        World::new(WorldConfig::default(), &[0x3F], &[100], &[200]).unwrap()
    }

    #[test]
    fn test_snapshot_blob_roundtrip() {
        let mut w = world();
        w.set_experiment_id("exp-7");
        w.add_synapse(
            NodeRef::Input(InputId::new(100)),
            NodeRef::Neuron(NeuronId::new(1)),
            SignalType::Delayed,
            0.5,
        )
        .unwrap();
        w.run_for(3).unwrap();

        let snapshot = w.snapshot();
        let bytes = snapshot.to_bytes().unwrap();
        let restored_snapshot = WorldSnapshot::from_bytes(&bytes).unwrap();
        let restored = World::restore(restored_snapshot).unwrap();

        assert_eq!(restored.snapshot().to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut snapshot = world().snapshot();
        snapshot.version = 99;
        let bytes = bincode::serialize(&snapshot).unwrap();
        assert!(WorldSnapshot::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_restore_preserves_identity_space() {
        let mut w = world();
        let before = w.add_neuron(crate::ids::Vec3::ZERO);

        let restored = World::restore(w.snapshot()).unwrap();
        let mut restored = restored;
        let after = restored.add_neuron(crate::ids::Vec3::ZERO);
        assert_eq!(after.raw(), before.raw() + 1);
    }

    #[test]
    fn test_restore_rebuilds_prng_stream() {
        let mut w = world();
        w.run_for(5).unwrap();
        let mut restored = World::restore(w.snapshot()).unwrap();
        assert_eq!(w.rng.next_u64(), restored.rng.next_u64());
        assert_eq!(w.metrics_rng.next_u64(), restored.metrics_rng.next_u64());
    }

    #[test]
    fn test_corrupt_blob_is_typed_error() {
        let err = WorldSnapshot::from_bytes(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, WorldError::Snapshot { .. }));
    }
}
