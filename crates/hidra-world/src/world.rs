//! Authoritative world state
//!
//! The world owns every collection the tick pipeline reads or writes.
//! All maps are id-sorted (`BTreeMap`) because any iteration that
//! contributes to state changes must run in id order for determinism.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use hidra_genome::{Genome, GENE_GESTATION, GENE_MITOSIS};

use crate::config::WorldConfig;
use crate::error::{Result, WorldError};
use crate::event::{Event, EventPayload, EventQueue};
use crate::ids::{EventId, InputId, NeuronId, NodeRef, OutputId, SynapseId, Vec3};
use crate::logsink::{LogLevel, LogSink};
use crate::metrics::MetricsRing;
use crate::neuron::{Neuron, LVAR_USER_MAX};
use crate::rng::WorldRng;
use crate::spatial::SpatialIndex;
use crate::synapse::{SignalType, Synapse};
use crate::vm::{self, SecurityContext};

/// Events archived for one completed tick.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// PotentialPulse events processed that tick
    pub pulses: Vec<Event>,
    /// Everything else processed that tick
    pub others: Vec<Event>,
}

/// Per-tick event archive, keyed by tick, behind its own lock so
/// readers never contend with the world lock.
pub type EventHistory = Arc<RwLock<BTreeMap<u64, TickEvents>>>;

/// The simulation world.
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) current_tick: u64,
    pub(crate) experiment_id: Option<String>,
    pub(crate) genome: Genome,
    pub(crate) neurons: BTreeMap<NeuronId, Neuron>,
    pub(crate) synapses: BTreeMap<SynapseId, Synapse>,
    pub(crate) inputs: BTreeMap<InputId, f32>,
    pub(crate) outputs: BTreeMap<OutputId, f32>,
    pub(crate) hormones: Vec<f32>,
    pub(crate) event_queue: EventQueue,
    pub(crate) next_neuron_id: u64,
    pub(crate) next_synapse_id: u64,
    pub(crate) next_event_id: u64,
    pub(crate) rng: WorldRng,
    pub(crate) metrics_rng: WorldRng,
    pub(crate) halted: Option<String>,

    // Caches rebuilt on topology change
    pub(crate) topo_order: Vec<NeuronId>,
    pub(crate) incoming: BTreeMap<NeuronId, Vec<SynapseId>>,
    pub(crate) input_driven: BTreeMap<InputId, Vec<SynapseId>>,
    pub(crate) spatial: SpatialIndex,
    pub(crate) caches_dirty: bool,

    // Intra-tick buffers
    pub(crate) current_pulses: Vec<Event>,
    pub(crate) current_others: Vec<Event>,
    pub(crate) next_tick_events: Vec<Event>,

    pub(crate) history: EventHistory,
    pub(crate) metrics: MetricsRing,
    pub(crate) log_sink: Option<LogSink>,
}

/// Fixed global hormone vector length.
pub const HORMONE_COUNT: usize = 256;

impl World {
    /// Construct a world from a configuration, a genome byte stream,
    /// and the declared input/output node ids.
    ///
    /// Construction compiles the genome, creates the declared IO nodes,
    /// and executes the Genesis gene in System context. If no neurons
    /// exist after Genesis, a default neuron is created at the origin.
    pub fn new(
        config: WorldConfig,
        genome_bytes: &[u8],
        input_ids: &[u64],
        output_ids: &[u64],
    ) -> Result<Self> {
        config.validate()?;
        let genome = Genome::compile(genome_bytes)?;

        let rng = WorldRng::from_seed(config.seed0, config.seed1);
        let metrics_rng =
            WorldRng::from_seed(config.seed0 ^ 0x6D65_7472_6963_7331, config.seed1 ^ 0x6D65_7472_6963_7332);
        let spatial = SpatialIndex::new(2.0 * config.competition_radius);
        let metrics = MetricsRing::new(config.metrics_ring_capacity);

        let mut world = Self {
            config,
            current_tick: 0,
            experiment_id: None,
            genome,
            neurons: BTreeMap::new(),
            synapses: BTreeMap::new(),
            inputs: input_ids.iter().map(|&id| (InputId::new(id), 0.0)).collect(),
            outputs: output_ids.iter().map(|&id| (OutputId::new(id), 0.0)).collect(),
            hormones: vec![0.0; HORMONE_COUNT],
            event_queue: EventQueue::new(),
            next_neuron_id: 1,
            next_synapse_id: 1,
            next_event_id: 1,
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

        let outcome = vm::run_gene(&mut world, hidra_genome::GENE_GENESIS, None, SecurityContext::System);
        if let Some(error) = outcome.error {
            world.emit("genesis", LogLevel::Error, &error);
        }

        if world.neurons.is_empty() {
            world.emit(
                "genesis",
                LogLevel::Info,
                "Genesis produced no neurons; creating the default neuron at the origin",
            );
            world.spawn_neuron(Vec3::ZERO);
        }

        // Commit construction-time events and enter tick 1
        let pending = std::mem::take(&mut world.next_tick_events);
        for event in pending {
            world.event_queue.push(event);
        }
        world.current_tick = 1;
        world.rebuild_caches();
        Ok(world)
    }

    /// Attach a log sink callback.
    pub fn set_log_sink(&mut self, sink: LogSink) {
        self.log_sink = Some(sink);
    }

    /// Tag this world with an experiment identifier.
    pub fn set_experiment_id(&mut self, id: impl Into<String>) {
        self.experiment_id = Some(id.into());
    }

    /// Emit a log entry to both the `log` facade and the sink callback.
    pub(crate) fn emit(&self, tag: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => log::debug!("[{tag}] {message}"),
            LogLevel::Info => log::info!("[{tag}] {message}"),
            LogLevel::Warning => log::warn!("[{tag}] {message}"),
            LogLevel::Error | LogLevel::Fatal => log::error!("[{tag}] {message}"),
        }
        if let Some(sink) = &self.log_sink {
            sink(tag, level, message);
        }
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub(crate) fn alloc_event_id(&mut self) -> EventId {
        let id = EventId::new(self.next_event_id);
        self.next_event_id += 1;
        id
    }

    /// The tick the next `step` call will execute.
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Whether the world has been halted by a phase failure.
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// The world configuration.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The compiled genome.
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Handle to the per-tick event archive.
    pub fn history(&self) -> EventHistory {
        Arc::clone(&self.history)
    }

    /// The metrics ring.
    pub fn metrics(&self) -> &MetricsRing {
        &self.metrics
    }

    // ------------------------------------------------------------------
    // Entity values
    // ------------------------------------------------------------------

    /// The current value an entity presents as a synapse source.
    pub(crate) fn entity_value(&self, node: NodeRef) -> f32 {
        match node {
            NodeRef::Input(id) => self.inputs.get(&id).copied().unwrap_or(0.0),
            NodeRef::Output(id) => self.outputs.get(&id).copied().unwrap_or(0.0),
            NodeRef::Neuron(id) => self
                .neurons
                .get(&id)
                .map(|n| n.last_output)
                .unwrap_or(0.0),
        }
    }

    fn endpoint_exists(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Neuron(id) => self.neurons.contains_key(&id),
            NodeRef::Input(id) => self.inputs.contains_key(&id),
            NodeRef::Output(id) => self.outputs.contains_key(&id),
        }
    }

    // ------------------------------------------------------------------
    // Topology mutation
    // ------------------------------------------------------------------

    /// Create a neuron without scheduling any lifecycle gene. Shared by
    /// the public creation paths.
    pub(crate) fn spawn_neuron(&mut self, position: Vec3) -> NeuronId {
        let id = NeuronId::new(self.next_neuron_id);
        self.next_neuron_id += 1;
        self.neurons.insert(id, Neuron::new(id, position, &self.config));
        self.caches_dirty = true;
        id
    }

    /// Create a neuron and schedule its Gestation gene for the next
    /// executed tick. This is the public `AddNeuron` operation; the
    /// bridge uses the buffered variant so in-tick creations commit in
    /// phase order.
    pub fn add_neuron(&mut self, position: Vec3) -> NeuronId {
        let id = self.spawn_neuron(position);
        let event = Event {
            id: self.alloc_event_id(),
            execute_at: self.current_tick,
            target: NodeRef::Neuron(id),
            payload: EventPayload::ExecuteGene {
                gene_id: GENE_GESTATION,
            },
        };
        self.event_queue.push(event);
        id
    }

    /// Bridge-side neuron creation: Gestation runs on the tick after
    /// the currently executing one.
    pub(crate) fn add_neuron_buffered(&mut self, position: Vec3) -> NeuronId {
        let id = self.spawn_neuron(position);
        let event = Event {
            id: self.alloc_event_id(),
            execute_at: self.current_tick + 1,
            target: NodeRef::Neuron(id),
            payload: EventPayload::ExecuteGene {
                gene_id: GENE_GESTATION,
            },
        };
        self.next_tick_events.push(event);
        id
    }

    /// Split `parent` into itself and a child offset by `offset`. The
    /// child copies the parent's user variables and brain; both cells
    /// get a Mitosis gene execution scheduled. The public operation
    /// commits its events directly; the bridge variant buffers them for
    /// the phase-6 commit.
    pub fn perform_mitosis(&mut self, parent: NeuronId, offset: Vec3) -> Result<NeuronId> {
        let child = self.mitosis_split(parent, offset)?;
        for cell in [parent, child] {
            let event = Event {
                id: self.alloc_event_id(),
                execute_at: self.current_tick,
                target: NodeRef::Neuron(cell),
                payload: EventPayload::ExecuteGene {
                    gene_id: GENE_MITOSIS,
                },
            };
            self.event_queue.push(event);
        }
        Ok(child)
    }

    /// Bridge-side mitosis: the Mitosis genes run on the tick after the
    /// currently executing one.
    pub(crate) fn perform_mitosis_buffered(
        &mut self,
        parent: NeuronId,
        offset: Vec3,
    ) -> Result<NeuronId> {
        let child = self.mitosis_split(parent, offset)?;
        for cell in [parent, child] {
            let event = Event {
                id: self.alloc_event_id(),
                execute_at: self.current_tick + 1,
                target: NodeRef::Neuron(cell),
                payload: EventPayload::ExecuteGene {
                    gene_id: GENE_MITOSIS,
                },
            };
            self.next_tick_events.push(event);
        }
        Ok(child)
    }

    fn mitosis_split(&mut self, parent: NeuronId, offset: Vec3) -> Result<NeuronId> {
        let (position, user_vars, brain) = {
            let parent_ref = self
                .neurons
                .get(&parent)
                .ok_or(WorldError::NeuronNotFound { neuron_id: parent.raw() })?;
            (
                parent_ref.position.add(&offset),
                parent_ref.lvars()[..=LVAR_USER_MAX].to_vec(),
                parent_ref.brain.clone(),
            )
        };

        let child = self.spawn_neuron(position);
        let child_ref = self.neurons.get_mut(&child).ok_or(WorldError::NeuronNotFound {
            neuron_id: child.raw(),
        })?;
        for (index, value) in user_vars.into_iter().enumerate() {
            child_ref.store_user_lvar(index, value);
        }
        child_ref.brain = brain;
        Ok(child)
    }

    /// Hard-remove a neuron and every synapse touching it.
    pub fn remove_neuron(&mut self, id: NeuronId) -> Result<()> {
        if self.neurons.remove(&id).is_none() {
            return Err(WorldError::NeuronNotFound { neuron_id: id.raw() });
        }
        let doomed: Vec<SynapseId> = self
            .synapses
            .values()
            .filter(|s| {
                s.source == NodeRef::Neuron(id) || s.target == NodeRef::Neuron(id)
            })
            .map(|s| s.id)
            .collect();
        for synapse_id in doomed {
            let _ = self.remove_synapse(synapse_id);
        }
        self.caches_dirty = true;
        Ok(())
    }

    /// Create a synapse between two existing endpoints.
    ///
    /// The source must be a neuron or input node, the target a neuron
    /// or output node, and at least one endpoint must be a neuron (the
    /// owner). The previous source value is seeded from the source's
    /// current value so temporal conditions start from reality.
    pub fn add_synapse(
        &mut self,
        source: NodeRef,
        target: NodeRef,
        signal_type: SignalType,
        weight: f32,
    ) -> Result<SynapseId> {
        if matches!(source, NodeRef::Output(_)) {
            return Err(WorldError::invalid_endpoint("an output node cannot be a synapse source"));
        }
        if matches!(target, NodeRef::Input(_)) {
            return Err(WorldError::invalid_endpoint("an input node cannot be a synapse target"));
        }
        if source.as_neuron().is_none() && target.as_neuron().is_none() {
            return Err(WorldError::invalid_endpoint(
                "a synapse needs a neuron endpoint to own it",
            ));
        }
        if !self.endpoint_exists(source) {
            return Err(WorldError::invalid_endpoint(format!("source {source} does not exist")));
        }
        if !self.endpoint_exists(target) {
            return Err(WorldError::invalid_endpoint(format!("target {target} does not exist")));
        }

        let id = SynapseId::new(self.next_synapse_id);
        self.next_synapse_id += 1;

        let mut synapse = Synapse::new(id, source, target, signal_type, weight);
        synapse.previous_source_value = self.entity_value(source);

        let owner = synapse.owner().as_neuron().ok_or_else(|| {
            WorldError::invalid_endpoint("synapse owner is not a neuron")
        })?;
        self.synapses.insert(id, synapse);
        if let Some(neuron) = self.neurons.get_mut(&owner) {
            neuron.adopt_synapse(id);
        }
        self.caches_dirty = true;
        Ok(id)
    }

    /// Remove a synapse from the global list and its owner's list.
    pub fn remove_synapse(&mut self, id: SynapseId) -> Result<()> {
        let synapse = self
            .synapses
            .remove(&id)
            .ok_or(WorldError::SynapseNotFound { synapse_id: id.raw() })?;
        if let Some(owner) = synapse.owner().as_neuron() {
            if let Some(neuron) = self.neurons.get_mut(&owner) {
                neuron.disown_synapse(id);
            }
        }
        self.caches_dirty = true;
        Ok(())
    }

    /// Declare a new input node.
    pub fn add_input_node(&mut self, id: u64) -> Result<()> {
        let id = InputId::new(id);
        if self.inputs.contains_key(&id) {
            return Err(WorldError::invalid_parameter(
                "input_id",
                id.to_string(),
                "an unused id",
            ));
        }
        self.inputs.insert(id, 0.0);
        Ok(())
    }

    /// Declare a new output node.
    pub fn add_output_node(&mut self, id: u64) -> Result<()> {
        let id = OutputId::new(id);
        if self.outputs.contains_key(&id) {
            return Err(WorldError::invalid_parameter(
                "output_id",
                id.to_string(),
                "an unused id",
            ));
        }
        self.outputs.insert(id, 0.0);
        Ok(())
    }

    /// Remove an input node and the synapses it drives.
    pub fn remove_input_node(&mut self, id: u64) -> Result<()> {
        let id = InputId::new(id);
        if self.inputs.remove(&id).is_none() {
            return Err(WorldError::InputNotFound { input_id: id.raw() });
        }
        let doomed: Vec<SynapseId> = self
            .synapses
            .values()
            .filter(|s| s.source == NodeRef::Input(id))
            .map(|s| s.id)
            .collect();
        for synapse_id in doomed {
            let _ = self.remove_synapse(synapse_id);
        }
        self.caches_dirty = true;
        Ok(())
    }

    /// Remove an output node and the synapses targeting it.
    pub fn remove_output_node(&mut self, id: u64) -> Result<()> {
        let id = OutputId::new(id);
        if self.outputs.remove(&id).is_none() {
            return Err(WorldError::OutputNotFound { output_id: id.raw() });
        }
        let doomed: Vec<SynapseId> = self
            .synapses
            .values()
            .filter(|s| s.target == NodeRef::Output(id))
            .map(|s| s.id)
            .collect();
        for synapse_id in doomed {
            let _ = self.remove_synapse(synapse_id);
        }
        self.caches_dirty = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Value mutation
    // ------------------------------------------------------------------

    /// Write input node values. Unknown ids are logged and skipped.
    pub fn set_input_values(&mut self, values: &BTreeMap<u64, f32>) {
        for (&raw, &value) in values {
            let id = InputId::new(raw);
            if self.inputs.contains_key(&id) {
                self.inputs.insert(id, value);
            } else {
                self.emit(
                    "inputs",
                    LogLevel::Warning,
                    &format!("ignoring value for undeclared input {id}"),
                );
            }
        }
    }

    /// Write one global hormone.
    pub fn set_global_hormone(&mut self, index: usize, value: f32) -> Result<()> {
        let slot = self.hormones.get_mut(index).ok_or_else(|| {
            WorldError::invalid_parameter("hormone_index", index.to_string(), "< 256")
        })?;
        *slot = value;
        Ok(())
    }

    /// Write a user-region local variable of a neuron.
    pub fn set_local_variable(&mut self, neuron: NeuronId, index: usize, value: f32) -> Result<()> {
        let neuron_ref = self
            .neurons
            .get_mut(&neuron)
            .ok_or(WorldError::NeuronNotFound { neuron_id: neuron.raw() })?;
        if !neuron_ref.store_user_lvar(index, value) {
            return Err(WorldError::LocalVariableReadOnly { index });
        }
        Ok(())
    }

    /// Set an addressable property on a synapse.
    pub fn set_synapse_property(
        &mut self,
        id: SynapseId,
        property: crate::synapse::SynapseProperty,
        value: f32,
    ) -> Result<()> {
        let synapse = self
            .synapses
            .get_mut(&id)
            .ok_or(WorldError::SynapseNotFound { synapse_id: id.raw() })?;
        synapse.set_property(property, value);
        Ok(())
    }

    /// Install (or clear) a transmission condition on a synapse.
    pub fn set_synapse_condition(
        &mut self,
        id: SynapseId,
        condition: Option<crate::condition::SynapseCondition>,
    ) -> Result<()> {
        let synapse = self
            .synapses
            .get_mut(&id)
            .ok_or(WorldError::SynapseNotFound { synapse_id: id.raw() })?;
        synapse.condition = condition;
        synapse.sustained_counter = 0;
        Ok(())
    }

    /// Schedule a gene execution on a neuron, `delay` ticks after the
    /// next executed tick.
    pub fn schedule_gene(&mut self, neuron: NeuronId, gene_id: usize, delay: u64) -> Result<EventId> {
        if !self.neurons.contains_key(&neuron) {
            return Err(WorldError::NeuronNotFound { neuron_id: neuron.raw() });
        }
        if gene_id >= self.genome.gene_count() {
            return Err(WorldError::invalid_parameter(
                "gene_id",
                gene_id.to_string(),
                format!("< {}", self.genome.gene_count()),
            ));
        }
        let event = Event {
            id: self.alloc_event_id(),
            execute_at: self.current_tick + delay,
            target: NodeRef::Neuron(neuron),
            payload: EventPayload::ExecuteGene { gene_id },
        };
        let id = event.id;
        self.event_queue.push(event);
        Ok(id)
    }

    /// Request deactivation of a neuron at the end of the next tick.
    pub fn mark_neuron_for_deactivation(&mut self, id: NeuronId) -> Result<()> {
        let neuron = self
            .neurons
            .get_mut(&id)
            .ok_or(WorldError::NeuronNotFound { neuron_id: id.raw() })?;
        neuron.marked_for_death = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads (defensive copies)
    // ------------------------------------------------------------------

    /// Clone of one neuron.
    pub fn neuron(&self, id: NeuronId) -> Option<Neuron> {
        self.neurons.get(&id).cloned()
    }

    /// Clones of all neurons in id order.
    pub fn neurons(&self) -> Vec<Neuron> {
        self.neurons.values().cloned().collect()
    }

    /// Clone of one synapse.
    pub fn synapse(&self, id: SynapseId) -> Option<Synapse> {
        self.synapses.get(&id).cloned()
    }

    /// Clones of all synapses in id order.
    pub fn synapses(&self) -> Vec<Synapse> {
        self.synapses.values().cloned().collect()
    }

    /// Current input node values in id order.
    pub fn input_values(&self) -> Vec<(u64, f32)> {
        self.inputs.iter().map(|(id, &v)| (id.raw(), v)).collect()
    }

    /// Current output node values in id order.
    pub fn output_values(&self) -> Vec<(u64, f32)> {
        self.outputs.iter().map(|(id, &v)| (id.raw(), v)).collect()
    }

    /// One output node's value.
    pub fn output_value(&self, id: u64) -> Option<f32> {
        self.outputs.get(&OutputId::new(id)).copied()
    }

    /// Copy of the hormone vector.
    pub fn hormones(&self) -> Vec<f32> {
        self.hormones.clone()
    }

    /// Diagnostic view of events queued for a tick.
    pub fn events_queued_for(&self, tick: u64) -> Vec<Event> {
        self.event_queue.peek_for_tick(tick)
    }

    // ------------------------------------------------------------------
    // Caches
    // ------------------------------------------------------------------

    /// Rebuild the incoming-synapse map, the input-driven map, the
    /// topological order, and the spatial index.
    pub(crate) fn rebuild_caches(&mut self) {
        self.incoming.clear();
        self.input_driven.clear();
        for (&id, synapse) in &self.synapses {
            if let NodeRef::Neuron(target) = synapse.target {
                self.incoming.entry(target).or_default().push(id);
            }
            if let NodeRef::Input(source) = synapse.source {
                self.input_driven.entry(source).or_default().push(id);
            }
        }

        // Shortest path (in hops) from any input node, by BFS over
        // neuron-to-neuron edges seeded with input-driven targets.
        let mut adjacency: BTreeMap<NeuronId, Vec<NeuronId>> = BTreeMap::new();
        for synapse in self.synapses.values() {
            if let (NodeRef::Neuron(a), NodeRef::Neuron(b)) = (synapse.source, synapse.target) {
                adjacency.entry(a).or_default().push(b);
            }
        }

        let mut distance: BTreeMap<NeuronId, u64> = BTreeMap::new();
        let mut frontier = VecDeque::new();
        for synapse_ids in self.input_driven.values() {
            for synapse_id in synapse_ids {
                if let Some(synapse) = self.synapses.get(synapse_id) {
                    if let NodeRef::Neuron(target) = synapse.target {
                        if !distance.contains_key(&target) {
                            distance.insert(target, 0);
                            frontier.push_back(target);
                        }
                    }
                }
            }
        }
        while let Some(node) = frontier.pop_front() {
            let d = distance[&node];
            if let Some(nexts) = adjacency.get(&node) {
                for &next in nexts {
                    if !distance.contains_key(&next) {
                        distance.insert(next, d + 1);
                        frontier.push_back(next);
                    }
                }
            }
        }

        let mut order: Vec<NeuronId> = self.neurons.keys().copied().collect();
        order.sort_by_key(|id| (distance.get(id).copied().unwrap_or(u64::MAX), *id));
        self.topo_order = order;

        self.spatial.clear();
        for neuron in self.neurons.values() {
            if neuron.active {
                self.spatial.insert(neuron.id, neuron.position);
            }
        }

        self.caches_dirty = false;
    }

    /// Evaluation order for the current topology (rebuilding if stale).
    pub fn topological_order(&mut self) -> Vec<NeuronId> {
        if self.caches_dirty {
            self.rebuild_caches();
        }
        self.topo_order.clone()
    }
}
