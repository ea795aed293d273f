//! The eight-phase deterministic tick pipeline
//!
//! All phases run under the caller's exclusive access to the world. A
//! phase error marks the world permanently halted with the phase name;
//! gene VM errors never escalate that far, they stay scoped to the
//! single gene inside phase 4.

use std::collections::{BTreeMap, BTreeSet};

use hidra_genome::GENE_APOPTOSIS;

use crate::condition::ConditionContext;
use crate::error::{Result, WorldError};
use crate::event::{Event, EventPayload};
use crate::ids::{NeuronId, NodeRef, SynapseId, Vec3};
use crate::kahan::KahanSum;
use crate::logsink::LogLevel;
use crate::metrics::WorldSample;
use crate::neuron::{
    LVAR_ADAPTIVE_THRESHOLD, LVAR_AGE, LVAR_DECAY_RATE, LVAR_DENDRITIC_POTENTIAL,
    LVAR_FIRING_RATE, LVAR_HEALTH, LVAR_REFRACTORY_LEFT, LVAR_REFRACTORY_PERIOD,
    LVAR_SOMA_POTENTIAL, LVAR_THRESHOLD_ADAPTATION, LVAR_THRESHOLD_RECOVERY,
};
use crate::synapse::SignalType;
use crate::vm::{self, SecurityContext};
use crate::world::{TickEvents, World};

impl World {
    /// Advance the world by one tick.
    ///
    /// Halted worlds refuse to step but keep answering read queries.
    pub fn step(&mut self) -> Result<()> {
        if let Some(reason) = &self.halted {
            return Err(WorldError::Halted {
                reason: reason.clone(),
            });
        }

        let phases: [(&'static str, fn(&mut World) -> Result<()>); 8] = [
            ("initialize", World::phase_initialize),
            ("passive-updates", World::phase_passive_updates),
            ("process-inputs", World::phase_process_inputs),
            ("evaluate-neurons", World::phase_evaluate_neurons),
            ("process-events", World::phase_process_events),
            ("deactivations", World::phase_deactivations),
            ("commit-events", World::phase_commit_events),
            ("archive-advance", World::phase_archive_and_advance),
        ];

        for (name, phase) in phases {
            if let Err(err) = phase(self) {
                let reason = format!("phase '{name}' failed: {err}");
                self.emit("engine", LogLevel::Fatal, &reason);
                self.halted = Some(reason.clone());
                return Err(WorldError::PhaseFailure {
                    phase: name,
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Write input values, then advance one tick.
    pub fn apply_inputs_and_step(&mut self, values: &BTreeMap<u64, f32>) -> Result<()> {
        self.set_input_values(values);
        self.step()
    }

    /// Advance `ticks` ticks.
    pub fn run_for(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Step until `predicate` holds or `max_ticks` elapse. Returns true
    /// when the predicate was satisfied.
    pub fn run_until(
        &mut self,
        mut predicate: impl FnMut(&World) -> bool,
        max_ticks: u64,
    ) -> Result<bool> {
        for _ in 0..max_ticks {
            if predicate(self) {
                return Ok(true);
            }
            self.step()?;
        }
        Ok(predicate(self))
    }

    // ------------------------------------------------------------------
    // Phase 0
    // ------------------------------------------------------------------

    fn phase_initialize(&mut self) -> Result<()> {
        if self.caches_dirty {
            self.rebuild_caches();
        }
        self.current_pulses.clear();
        self.current_others.clear();
        self.next_tick_events.clear();

        let drained = self.event_queue.drain_due(self.current_tick);
        self.current_pulses = drained.pulses;
        self.current_others = drained.others;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 1
    // ------------------------------------------------------------------

    fn phase_passive_updates(&mut self) -> Result<()> {
        let tax = self.config.metabolic_tax_per_tick;
        let ma_weight = self.config.firing_rate_ma_weight;

        for neuron in self.neurons.values_mut() {
            if !neuron.active {
                continue;
            }
            let decay = neuron.lvar(LVAR_DECAY_RATE);
            neuron.store_system_lvar(
                LVAR_SOMA_POTENTIAL,
                neuron.soma_potential() * (1.0 - decay),
            );
            neuron.store_system_lvar(LVAR_FIRING_RATE, neuron.firing_rate() * ma_weight);
            neuron.store_system_lvar(LVAR_AGE, neuron.age() + 1.0);
            neuron.store_system_lvar(LVAR_HEALTH, neuron.health() - tax);
            if neuron.health() <= 0.0 {
                neuron.marked_for_death = true;
            }
            neuron.store_system_lvar(
                LVAR_REFRACTORY_LEFT,
                (neuron.refractory_left() - 1.0).max(0.0),
            );
            let recovery = neuron.lvar(LVAR_THRESHOLD_RECOVERY);
            neuron.store_system_lvar(
                LVAR_ADAPTIVE_THRESHOLD,
                neuron.adaptive_threshold() * (1.0 - recovery),
            );
        }

        for synapse in self.synapses.values_mut() {
            if synapse.active {
                synapse.recover_fatigue();
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 2
    // ------------------------------------------------------------------

    fn phase_process_inputs(&mut self) -> Result<()> {
        let input_map: Vec<(f32, Vec<SynapseId>)> = self
            .input_driven
            .iter()
            .map(|(input_id, synapse_ids)| {
                (
                    self.inputs.get(input_id).copied().unwrap_or(0.0),
                    synapse_ids.clone(),
                )
            })
            .collect();

        for (value, synapse_ids) in input_map {
            for synapse_id in synapse_ids {
                let Some((active, signal_type, weight, parameter, target)) =
                    self.synapses.get(&synapse_id).map(|s| {
                        (s.active, s.signal_type, s.weight, s.parameter, s.target)
                    })
                else {
                    continue;
                };
                if !active {
                    continue;
                }

                if self.eval_synapse_condition(synapse_id, value, false) {
                    let pulse = value * weight;
                    match signal_type {
                        SignalType::Immediate | SignalType::Transient => {
                            let smoothing = (signal_type == SignalType::Immediate)
                                .then(|| parameter.clamp(0.0, 1.0));
                            let event = Event {
                                id: self.alloc_event_id(),
                                execute_at: self.current_tick,
                                target,
                                payload: EventPayload::PotentialPulse {
                                    value: pulse,
                                    smoothing,
                                },
                            };
                            self.current_pulses.push(event);
                        }
                        SignalType::Delayed => {
                            let delay = parameter.max(0.0).trunc() as u64;
                            let execute_at = self.current_tick + delay;
                            let event = Event {
                                id: self.alloc_event_id(),
                                execute_at,
                                target,
                                payload: EventPayload::PotentialPulse {
                                    value: pulse,
                                    smoothing: None,
                                },
                            };
                            if execute_at <= self.current_tick {
                                self.current_pulses.push(event);
                            } else {
                                self.next_tick_events.push(event);
                            }
                        }
                        SignalType::Persistent => {
                            if let Some(synapse) = self.synapses.get_mut(&synapse_id) {
                                synapse.persistent_value = pulse;
                                synapse.persistent_set = true;
                            }
                        }
                    }
                }

                if let Some(synapse) = self.synapses.get_mut(&synapse_id) {
                    synapse.previous_source_value = value;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 3
    // ------------------------------------------------------------------

    fn phase_evaluate_neurons(&mut self) -> Result<()> {
        let mut accumulators: BTreeMap<NeuronId, KahanSum> = BTreeMap::new();

        // Pending Transient deliveries fire exactly once on their tick
        let due_transients: Vec<SynapseId> = self
            .synapses
            .values()
            .filter(|s| s.active && s.transient_trigger_tick == Some(self.current_tick))
            .map(|s| s.id)
            .collect();
        for synapse_id in due_transients {
            let Some((value, target)) = self
                .synapses
                .get_mut(&synapse_id)
                .map(|s| {
                    s.transient_trigger_tick = None;
                    (s.persistent_value, s.target)
                })
            else {
                continue;
            };
            match target {
                NodeRef::Neuron(id) => {
                    accumulators.entry(id).or_default().add(value);
                }
                NodeRef::Output(id) => self.apply_output_pulse(id, value, None),
                NodeRef::Input(_) => {
                    self.emit("engine", LogLevel::Warning, "transient delivery targets an input node");
                }
            }
        }

        // Integrate pulses
        let pulses = std::mem::take(&mut self.current_pulses);
        for event in &pulses {
            if let EventPayload::PotentialPulse { value, smoothing } = event.payload {
                match event.target {
                    NodeRef::Neuron(id) => {
                        accumulators.entry(id).or_default().add(value);
                    }
                    NodeRef::Output(id) => {
                        self.apply_output_pulse(id, value, smoothing);
                    }
                    NodeRef::Input(_) => {
                        self.emit(
                            "engine",
                            LogLevel::Warning,
                            &format!("pulse {} targets an input node, dropped", event.id),
                        );
                    }
                }
            }
        }
        self.current_pulses = pulses;

        // Evaluate in topological order
        let order = self.topo_order.clone();
        for neuron_id in order {
            let Some(neuron) = self.neurons.get(&neuron_id) else {
                continue;
            };
            if !neuron.active {
                continue;
            }

            let mut baseline = 0.0f32;
            if let Some(incoming) = self.incoming.get(&neuron_id) {
                for synapse_id in incoming {
                    if let Some(synapse) = self.synapses.get(synapse_id) {
                        if synapse.active
                            && synapse.signal_type == SignalType::Persistent
                            && synapse.persistent_set
                        {
                            baseline += synapse.persistent_value;
                        }
                    }
                }
            }
            let pulse_total = accumulators
                .get(&neuron_id)
                .map(|acc| acc.total())
                .unwrap_or(0.0);

            let (fires, total) = {
                let Some(neuron) = self.neurons.get_mut(&neuron_id) else {
                    continue;
                };
                neuron.store_system_lvar(LVAR_DENDRITIC_POTENTIAL, baseline);
                neuron.store_system_lvar(
                    LVAR_SOMA_POTENTIAL,
                    neuron.soma_potential() + pulse_total,
                );
                let total = neuron.total_potential();
                let effective_threshold =
                    neuron.firing_threshold() + neuron.adaptive_threshold();
                (
                    neuron.refractory_left() == 0.0 && total >= effective_threshold,
                    total,
                )
            };

            if fires {
                let event = Event {
                    id: self.alloc_event_id(),
                    execute_at: self.current_tick,
                    target: NodeRef::Neuron(neuron_id),
                    payload: EventPayload::Activate { potential: total },
                };
                self.current_others.push(event);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 4
    // ------------------------------------------------------------------

    fn phase_process_events(&mut self) -> Result<()> {
        self.current_others.sort_by_key(|event| event.id);
        let events = std::mem::take(&mut self.current_others);
        for event in &events {
            self.dispatch_event(event);
        }
        self.current_others = events;
        Ok(())
    }

    fn dispatch_event(&mut self, event: &Event) {
        match event.payload {
            EventPayload::ExecuteGene { gene_id } => {
                let context =
                    SecurityContext::for_gene(gene_id, self.config.system_gene_count);
                self.run_gene_on(event.target, gene_id, context);
            }
            EventPayload::ExecuteGeneFromBrain { gene_id } => {
                self.run_gene_on(event.target, gene_id, SecurityContext::General);
            }
            EventPayload::Activate { potential } => {
                if let NodeRef::Neuron(id) = event.target {
                    self.process_neuron_activation(id, potential);
                } else {
                    self.emit(
                        "engine",
                        LogLevel::Warning,
                        &format!("activate event {} targets a non-neuron", event.id),
                    );
                }
            }
            EventPayload::PotentialPulse { value, smoothing } => {
                // Same-tick targeted pulses that bypassed phase-3
                // accumulation land directly
                self.deliver_direct(event.target, value, smoothing);
            }
        }
    }

    fn run_gene_on(&mut self, target: NodeRef, gene_id: usize, context: SecurityContext) {
        let executing = match target {
            NodeRef::Neuron(id) => {
                let alive = self
                    .neurons
                    .get(&id)
                    .map(|n| n.active)
                    .unwrap_or(false);
                if !alive {
                    self.emit(
                        "vm",
                        LogLevel::Warning,
                        &format!("gene {gene_id} target {id} is missing or inactive"),
                    );
                    return;
                }
                Some(id)
            }
            _ => None,
        };
        let outcome = vm::run_gene(self, gene_id, executing, context);
        if let Some(error) = outcome.error {
            self.emit("vm", LogLevel::Error, &error);
        }
    }

    /// Activation sequence: brain evaluation, output application,
    /// synaptic propagation, and post-firing bookkeeping.
    fn process_neuron_activation(&mut self, neuron_id: NeuronId, potential: f32) {
        let (input_map, incoming_ids) = {
            let Some(neuron) = self.neurons.get(&neuron_id) else {
                return;
            };
            if !neuron.active {
                return;
            }
            (
                neuron.brain.input_map(),
                self.incoming.get(&neuron_id).cloned().unwrap_or_default(),
            )
        };

        // 1. Assemble brain inputs
        let mut inputs = Vec::with_capacity(input_map.len());
        for source in input_map {
            inputs.push(self.read_brain_input(neuron_id, source, potential, &incoming_ids));
        }

        // 2. Evaluate
        let (outputs, output_map) = {
            let Some(neuron) = self.neurons.get_mut(&neuron_id) else {
                return;
            };
            let output_map = neuron.brain.output_map();
            (neuron.brain.evaluate(&inputs), output_map)
        };

        // 3. Apply outputs
        let mut brain_output = potential;
        let mut translation = Vec3::ZERO;
        for (action, value) in output_map.iter().zip(outputs) {
            match action {
                crate::brain::BrainOutputAction::SetOutput => brain_output = value,
                crate::brain::BrainOutputAction::MoveX => translation.x += value,
                crate::brain::BrainOutputAction::MoveY => translation.y += value,
                crate::brain::BrainOutputAction::MoveZ => translation.z += value,
                crate::brain::BrainOutputAction::ExecuteGene => {
                    let gene_id =
                        value.abs().trunc() as usize + self.config.system_gene_count;
                    if gene_id < self.genome.gene_count() {
                        let event = Event {
                            id: self.alloc_event_id(),
                            execute_at: self.current_tick + 1,
                            target: NodeRef::Neuron(neuron_id),
                            payload: EventPayload::ExecuteGeneFromBrain { gene_id },
                        };
                        self.next_tick_events.push(event);
                    } else {
                        self.emit(
                            "engine",
                            LogLevel::Warning,
                            &format!("brain requested gene {gene_id}, out of range"),
                        );
                    }
                }
            }
        }

        if translation != Vec3::ZERO {
            if let Some(neuron) = self.neurons.get_mut(&neuron_id) {
                neuron.position = neuron.position.add(&translation);
            }
            self.caches_dirty = true;
        }
        if let Some(neuron) = self.neurons.get_mut(&neuron_id) {
            neuron.last_output = brain_output;
        }

        // 4. Propagate along owned outgoing synapses
        let owned: Vec<SynapseId> = self
            .neurons
            .get(&neuron_id)
            .map(|n| n.owned_synapses.to_vec())
            .unwrap_or_default();
        for synapse_id in owned {
            let Some((active, is_outgoing)) = self.synapses.get(&synapse_id).map(|s| {
                (s.active, s.source == NodeRef::Neuron(neuron_id))
            }) else {
                continue;
            };
            if !active || !is_outgoing {
                continue;
            }

            if self.eval_synapse_condition(synapse_id, brain_output, true) {
                let Some((transmitted, signal_type, parameter, target)) =
                    self.synapses.get_mut(&synapse_id).map(|synapse| {
                        let transmitted =
                            brain_output * synapse.weight * (1.0 - synapse.fatigue);
                        synapse.accumulate_fatigue(transmitted);
                        (transmitted, synapse.signal_type, synapse.parameter, synapse.target)
                    })
                else {
                    continue;
                };

                match signal_type {
                    SignalType::Delayed | SignalType::Immediate => {
                        let delay = if signal_type == SignalType::Delayed {
                            parameter.max(0.0).trunc() as u64
                        } else {
                            0
                        };
                        let smoothing = (signal_type == SignalType::Immediate)
                            .then(|| parameter.clamp(0.0, 1.0));
                        let event = Event {
                            id: self.alloc_event_id(),
                            execute_at: self.current_tick + 1 + delay,
                            target,
                            payload: EventPayload::PotentialPulse {
                                value: transmitted,
                                smoothing,
                            },
                        };
                        self.next_tick_events.push(event);
                    }
                    SignalType::Persistent => {
                        if let Some(synapse) = self.synapses.get_mut(&synapse_id) {
                            synapse.persistent_value = transmitted;
                            synapse.persistent_set = true;
                        }
                    }
                    SignalType::Transient => {
                        if let Some(synapse) = self.synapses.get_mut(&synapse_id) {
                            synapse.persistent_value = transmitted;
                            synapse.persistent_set = true;
                            synapse.transient_trigger_tick = Some(self.current_tick + 1);
                        }
                    }
                }
            }

            if let Some(synapse) = self.synapses.get_mut(&synapse_id) {
                synapse.previous_source_value = brain_output;
            }
        }

        // 5. Post-firing bookkeeping
        let ma_weight = self.config.firing_rate_ma_weight;
        if let Some(neuron) = self.neurons.get_mut(&neuron_id) {
            neuron.store_system_lvar(LVAR_SOMA_POTENTIAL, 0.0);
            let period = neuron.lvar(LVAR_REFRACTORY_PERIOD);
            neuron.store_system_lvar(LVAR_REFRACTORY_LEFT, period);
            let adaptation = neuron.lvar(LVAR_THRESHOLD_ADAPTATION);
            neuron.store_system_lvar(
                LVAR_ADAPTIVE_THRESHOLD,
                neuron.adaptive_threshold() + adaptation,
            );
            neuron.store_system_lvar(
                LVAR_FIRING_RATE,
                neuron.firing_rate() + (1.0 - ma_weight),
            );
        }
    }

    fn read_brain_input(
        &self,
        neuron_id: NeuronId,
        source: crate::brain::BrainInputSource,
        potential: f32,
        incoming_ids: &[SynapseId],
    ) -> f32 {
        use crate::brain::BrainInputSource as Src;
        let neuron = self.neurons.get(&neuron_id);
        match source {
            Src::ActivationPotential => potential,
            Src::TotalPotential => neuron.map(|n| n.total_potential()).unwrap_or(0.0),
            Src::Health => neuron.map(|n| n.health()).unwrap_or(0.0),
            Src::Age => neuron.map(|n| n.age()).unwrap_or(0.0),
            Src::FiringRate => neuron.map(|n| n.firing_rate()).unwrap_or(0.0),
            Src::LocalVar(index) => neuron.map(|n| n.lvar(index)).unwrap_or(0.0),
            Src::Hormone(index) => {
                self.hormones.get(index).copied().unwrap_or_else(|| {
                    self.emit(
                        "engine",
                        LogLevel::Warning,
                        &format!("brain input hormone {index} out of range"),
                    );
                    0.0
                })
            }
            Src::IncomingSynapse(index) => incoming_ids
                .get(index)
                .and_then(|sid| self.synapses.get(sid))
                .map(|s| s.previous_source_value)
                .unwrap_or_else(|| {
                    self.emit(
                        "engine",
                        LogLevel::Warning,
                        &format!("brain input synapse index {index} out of range"),
                    );
                    0.0
                }),
            Src::Constant(value) => value,
        }
    }

    // ------------------------------------------------------------------
    // Phase 5
    // ------------------------------------------------------------------

    fn phase_deactivations(&mut self) -> Result<()> {
        let dead: Vec<NeuronId> = self
            .neurons
            .values()
            .filter(|n| n.marked_for_death && n.active)
            .map(|n| n.id)
            .collect();

        for neuron_id in dead {
            let downstream: BTreeSet<NeuronId> = self
                .synapses
                .values()
                .filter(|s| s.active && s.source == NodeRef::Neuron(neuron_id))
                .filter_map(|s| s.target.as_neuron())
                .collect();
            for target in downstream {
                let event = Event {
                    id: self.alloc_event_id(),
                    execute_at: self.current_tick + 1,
                    target: NodeRef::Neuron(target),
                    payload: EventPayload::ExecuteGene {
                        gene_id: GENE_APOPTOSIS,
                    },
                };
                self.next_tick_events.push(event);
            }

            if let Some(neuron) = self.neurons.get_mut(&neuron_id) {
                neuron.active = false;
            }
            for synapse in self.synapses.values_mut() {
                if synapse.source == NodeRef::Neuron(neuron_id)
                    || synapse.target == NodeRef::Neuron(neuron_id)
                {
                    synapse.active = false;
                }
            }
            self.emit(
                "engine",
                LogLevel::Info,
                &format!("neuron {neuron_id} deactivated"),
            );
            self.caches_dirty = true;
        }

        // Sweep synapses that went inactive this tick
        let swept: Vec<SynapseId> = self
            .synapses
            .values()
            .filter(|s| !s.active)
            .map(|s| s.id)
            .collect();
        for synapse_id in swept {
            let _ = self.remove_synapse(synapse_id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 6
    // ------------------------------------------------------------------

    fn phase_commit_events(&mut self) -> Result<()> {
        for event in std::mem::take(&mut self.next_tick_events) {
            self.event_queue.push(event);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 7
    // ------------------------------------------------------------------

    fn phase_archive_and_advance(&mut self) -> Result<()> {
        if self.config.metrics_enabled
            && self.current_tick % self.config.metrics_collection_interval == 0
        {
            let mut rng = self.metrics_rng;
            let sample = WorldSample::collect(self, &mut rng);
            self.metrics_rng = rng;
            self.metrics.push(sample);
        }

        {
            let history = std::sync::Arc::clone(&self.history);
            let mut history = history.write();
            history.insert(
                self.current_tick,
                TickEvents {
                    pulses: self.current_pulses.clone(),
                    others: self.current_others.clone(),
                },
            );
        }

        self.current_tick += 1;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    /// Evaluate a synapse's condition against `source_value`, writing
    /// back the sustained counter. Without a condition the default test
    /// is `source_value > 0` for input-driven evaluation and an
    /// unconditional pass during activation propagation.
    fn eval_synapse_condition(
        &mut self,
        synapse_id: SynapseId,
        source_value: f32,
        default_pass: bool,
    ) -> bool {
        let Some((condition, previous, counter, source, target)) =
            self.synapses.get(&synapse_id).map(|s| {
                (
                    s.condition.clone(),
                    s.previous_source_value,
                    s.sustained_counter,
                    s.source,
                    s.target,
                )
            })
        else {
            return false;
        };

        let Some(condition) = condition else {
            return default_pass || source_value > 0.0;
        };

        let (passed, new_counter) = {
            let source_neuron = source.as_neuron().and_then(|id| self.neurons.get(&id));
            let target_neuron = target.as_neuron().and_then(|id| self.neurons.get(&id));
            let mut context = ConditionContext {
                source_value,
                previous_source_value: previous,
                target_potential: target_neuron.map(|n| n.total_potential()),
                source_lvars: source_neuron.map(|n| n.lvars()),
                target_lvars: target_neuron.map(|n| n.lvars()),
                hormones: &self.hormones,
                sustained_counter: counter,
            };
            (condition.evaluate(&mut context), context.sustained_counter)
        };

        if let Some(synapse) = self.synapses.get_mut(&synapse_id) {
            synapse.sustained_counter = new_counter;
        }
        passed
    }

    /// Deliver a value straight to a target, bypassing accumulation.
    fn deliver_direct(&mut self, target: NodeRef, value: f32, smoothing: Option<f32>) {
        match target {
            NodeRef::Neuron(id) => {
                if let Some(neuron) = self.neurons.get_mut(&id) {
                    if neuron.active {
                        neuron.store_system_lvar(
                            LVAR_SOMA_POTENTIAL,
                            neuron.soma_potential() + value,
                        );
                    }
                }
            }
            NodeRef::Output(id) => self.apply_output_pulse(id, value, smoothing),
            NodeRef::Input(_) => {
                self.emit("engine", LogLevel::Warning, "pulse targets an input node");
            }
        }
    }

    /// Output nodes smooth Immediate-sourced pulses and add the rest.
    fn apply_output_pulse(&mut self, id: crate::ids::OutputId, value: f32, smoothing: Option<f32>) {
        if let Some(slot) = self.outputs.get_mut(&id) {
            match smoothing {
                Some(alpha) => *slot = (1.0 - alpha) * *slot + alpha * value,
                None => *slot += value,
            }
        }
    }
}
