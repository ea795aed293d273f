//! Thread-safe control surface
//!
//! A [`WorldHandle`] serializes every read/write against the world
//! behind one exclusive lock, with the event-history archive behind its
//! own lock so history readers never contend with stepping. Clones of
//! the handle share the same world.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::WorldConfig;
use crate::error::Result;
use crate::event::Event;
use crate::ids::{NeuronId, NodeRef, SynapseId, Vec3};
use crate::logsink::LogSink;
use crate::metrics::{MetricsSummary, WorldSample};
use crate::neuron::Neuron;
use crate::snapshot::WorldSnapshot;
use crate::synapse::{SignalType, Synapse};
use crate::world::{EventHistory, TickEvents, World};

/// Shared, lock-guarded access to one world.
#[derive(Clone)]
pub struct WorldHandle {
    world: Arc<Mutex<World>>,
    history: EventHistory,
}

impl WorldHandle {
    /// Construct a world and wrap it.
    pub fn create(
        config: WorldConfig,
        genome_bytes: &[u8],
        input_ids: &[u64],
        output_ids: &[u64],
    ) -> Result<Self> {
        Ok(Self::from_world(World::new(
            config,
            genome_bytes,
            input_ids,
            output_ids,
        )?))
    }

    /// Wrap an existing world.
    pub fn from_world(world: World) -> Self {
        let history = world.history();
        Self {
            world: Arc::new(Mutex::new(world)),
            history,
        }
    }

    /// Restore from a snapshot and wrap the result.
    pub fn restore(snapshot: WorldSnapshot) -> Result<Self> {
        Ok(Self::from_world(World::restore(snapshot)?))
    }

    /// Run a closure under the world lock. Escape hatch for compound
    /// operations that must be atomic against stepping.
    pub fn with_world<T>(&self, f: impl FnOnce(&mut World) -> T) -> T {
        f(&mut self.world.lock())
    }

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Advance one tick.
    pub fn step(&self) -> Result<()> {
        self.world.lock().step()
    }

    /// Write input values, then advance one tick.
    pub fn apply_inputs_and_step(&self, values: &BTreeMap<u64, f32>) -> Result<()> {
        self.world.lock().apply_inputs_and_step(values)
    }

    /// Advance `ticks` ticks. The lock is released between ticks so an
    /// external stop or read can interleave.
    pub fn run_for(&self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Step until the predicate holds or the budget runs out. Returns
    /// true when the predicate was satisfied.
    pub fn run_until(
        &self,
        mut predicate: impl FnMut(&World) -> bool,
        max_ticks: u64,
    ) -> Result<bool> {
        for _ in 0..max_ticks {
            {
                let world = self.world.lock();
                if predicate(&world) {
                    return Ok(true);
                }
            }
            self.step()?;
        }
        let world = self.world.lock();
        Ok(predicate(&world))
    }

    // ------------------------------------------------------------------
    // Topology mutation
    // ------------------------------------------------------------------

    /// Create a neuron; its Gestation gene runs at the next step.
    pub fn add_neuron(&self, position: Vec3) -> NeuronId {
        self.world.lock().add_neuron(position)
    }

    /// Remove a neuron and every synapse touching it.
    pub fn remove_neuron(&self, id: NeuronId) -> Result<()> {
        self.world.lock().remove_neuron(id)
    }

    /// Create a synapse.
    pub fn add_synapse(
        &self,
        source: NodeRef,
        target: NodeRef,
        signal_type: SignalType,
        weight: f32,
    ) -> Result<SynapseId> {
        self.world.lock().add_synapse(source, target, signal_type, weight)
    }

    /// Remove a synapse.
    pub fn remove_synapse(&self, id: SynapseId) -> Result<()> {
        self.world.lock().remove_synapse(id)
    }

    /// Declare an input node.
    pub fn add_input_node(&self, id: u64) -> Result<()> {
        self.world.lock().add_input_node(id)
    }

    /// Declare an output node.
    pub fn add_output_node(&self, id: u64) -> Result<()> {
        self.world.lock().add_output_node(id)
    }

    /// Remove an input node and its outgoing synapses.
    pub fn remove_input_node(&self, id: u64) -> Result<()> {
        self.world.lock().remove_input_node(id)
    }

    /// Remove an output node and its incoming synapses.
    pub fn remove_output_node(&self, id: u64) -> Result<()> {
        self.world.lock().remove_output_node(id)
    }

    /// Split a neuron; Mitosis genes run at the next step.
    pub fn perform_mitosis(&self, parent: NeuronId, offset: Vec3) -> Result<NeuronId> {
        self.world.lock().perform_mitosis(parent, offset)
    }

    /// Request a neuron's deactivation.
    pub fn mark_neuron_for_deactivation(&self, id: NeuronId) -> Result<()> {
        self.world.lock().mark_neuron_for_deactivation(id)
    }

    /// Set an addressable property on a synapse.
    pub fn set_synapse_property(
        &self,
        id: SynapseId,
        property: crate::synapse::SynapseProperty,
        value: f32,
    ) -> Result<()> {
        self.world.lock().set_synapse_property(id, property, value)
    }

    /// Install (or clear) a transmission condition on a synapse.
    pub fn set_synapse_condition(
        &self,
        id: SynapseId,
        condition: Option<crate::condition::SynapseCondition>,
    ) -> Result<()> {
        self.world.lock().set_synapse_condition(id, condition)
    }

    /// Schedule a gene execution on a neuron.
    pub fn schedule_gene(
        &self,
        neuron: NeuronId,
        gene_id: usize,
        delay: u64,
    ) -> Result<crate::ids::EventId> {
        self.world.lock().schedule_gene(neuron, gene_id, delay)
    }

    // ------------------------------------------------------------------
    // Value mutation
    // ------------------------------------------------------------------

    /// Write input node values.
    pub fn set_input_values(&self, values: &BTreeMap<u64, f32>) {
        self.world.lock().set_input_values(values)
    }

    /// Write one global hormone.
    pub fn set_global_hormone(&self, index: usize, value: f32) -> Result<()> {
        self.world.lock().set_global_hormone(index, value)
    }

    /// Write a user-region local variable.
    pub fn set_local_variable(&self, neuron: NeuronId, index: usize, value: f32) -> Result<()> {
        self.world.lock().set_local_variable(neuron, index, value)
    }

    /// Attach a log sink.
    pub fn set_log_sink(&self, sink: LogSink) {
        self.world.lock().set_log_sink(sink)
    }

    // ------------------------------------------------------------------
    // Reads (defensive copies)
    // ------------------------------------------------------------------

    /// The tick the next step will execute.
    pub fn current_tick(&self) -> u64 {
        self.world.lock().current_tick()
    }

    /// Whether a phase failure has halted the world.
    pub fn is_halted(&self) -> bool {
        self.world.lock().is_halted()
    }

    /// Clone of one neuron.
    pub fn neuron(&self, id: NeuronId) -> Option<Neuron> {
        self.world.lock().neuron(id)
    }

    /// Clones of all neurons.
    pub fn neurons(&self) -> Vec<Neuron> {
        self.world.lock().neurons()
    }

    /// Clone of one synapse.
    pub fn synapse(&self, id: SynapseId) -> Option<Synapse> {
        self.world.lock().synapse(id)
    }

    /// Clones of all synapses.
    pub fn synapses(&self) -> Vec<Synapse> {
        self.world.lock().synapses()
    }

    /// Output node values.
    pub fn output_values(&self) -> Vec<(u64, f32)> {
        self.world.lock().output_values()
    }

    /// One output node's value.
    pub fn output_value(&self, id: u64) -> Option<f32> {
        self.world.lock().output_value(id)
    }

    /// Copy of the hormone vector.
    pub fn hormones(&self) -> Vec<f32> {
        self.world.lock().hormones()
    }

    /// Retained metrics samples, oldest first.
    pub fn metrics_samples(&self) -> Vec<WorldSample> {
        self.world.lock().metrics().samples()
    }

    /// Lifetime metrics aggregates.
    pub fn metrics_summary(&self) -> MetricsSummary {
        self.world.lock().metrics().summary()
    }

    /// Snapshot the world.
    pub fn snapshot(&self) -> WorldSnapshot {
        self.world.lock().snapshot()
    }

    /// Diagnostic: events queued for a tick.
    pub fn events_queued_for(&self, tick: u64) -> Vec<Event> {
        self.world.lock().events_queued_for(tick)
    }

    // ------------------------------------------------------------------
    // Event history (separate lock)
    // ------------------------------------------------------------------

    /// Archived events for one completed tick.
    pub fn history_for(&self, tick: u64) -> Option<TickEvents> {
        self.history.read().get(&tick).cloned()
    }

    /// Archived events for a tick range, oldest first.
    pub fn history_range(&self, from: u64, to: u64) -> Vec<(u64, TickEvents)> {
        self.history
            .read()
            .range(from..=to)
            .map(|(&tick, events)| (tick, events.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPayload;
    use crate::ids::InputId;

    fn handle() -> WorldHandle {
        WorldHandle::create(WorldConfig::default(), &[0x3F], &[100], &[200]).unwrap()
    }

    #[test]
    fn test_step_and_read() {
        let h = handle();
        assert_eq!(h.current_tick(), 1);
        h.step().unwrap();
        assert_eq!(h.current_tick(), 2);
        assert_eq!(h.neurons().len(), 1);
    }

    #[test]
    fn test_history_readable_from_clone() {
        let h = handle();
        let reader = h.clone();
        h.run_for(3).unwrap();
        assert!(reader.history_for(1).is_some());
        assert_eq!(reader.history_range(1, 3).len(), 3);
        assert!(reader.history_for(99).is_none());
    }

    #[test]
    fn test_concurrent_reads_while_stepping() {
        let h = handle();
        let reader = h.clone();
        let writer = std::thread::spawn(move || {
            h.run_for(50).unwrap();
        });
        for _ in 0..50 {
            let _ = reader.neurons();
            let _ = reader.history_for(1);
        }
        writer.join().unwrap();
        assert_eq!(reader.current_tick(), 51);
    }

    #[test]
    fn test_activation_reaches_history() {
        let h = handle();
        h.add_synapse(
            NodeRef::Input(InputId::new(100)),
            NodeRef::Neuron(NeuronId::new(1)),
            SignalType::Immediate,
            1.0,
        )
        .unwrap();
        let mut values = BTreeMap::new();
        values.insert(100u64, 2.0f32);
        let tick = h.current_tick();
        h.apply_inputs_and_step(&values).unwrap();

        let events = h.history_for(tick).unwrap();
        assert_eq!(events.pulses.len(), 1);
        assert!(events
            .others
            .iter()
            .any(|e| matches!(e.payload, EventPayload::Activate { .. })));
    }

    #[test]
    fn test_run_until() {
        let h = handle();
        let reached = h.run_until(|w| w.current_tick() >= 5, 100).unwrap();
        assert!(reached);
        assert_eq!(h.current_tick(), 5);

        let unreached = h.run_until(|w| w.current_tick() >= 1000, 3).unwrap();
        assert!(!unreached);
    }
}
