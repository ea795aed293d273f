//! Metrics sampling: ring buffer of world samples plus aggregates
//!
//! Samples are taken on the configured collection interval during the
//! archive phase. Probe neurons are chosen with the dedicated metrics
//! PRNG so observation never advances the simulation stream.

use serde::{Deserialize, Serialize};

use crate::ids::{NeuronId, SynapseId};
use crate::rng::WorldRng;
use crate::world::World;

/// Number of probe neurons carried per sample.
const PROBE_NEURONS: usize = 8;

/// Per-synapse detail included when `metrics_include_synapses` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseSample {
    /// Synapse id
    pub id: SynapseId,
    /// Current weight
    pub weight: f32,
    /// Current fatigue level
    pub fatigue: f32,
}

/// One sampled view of the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSample {
    /// Tick the sample was taken at
    pub tick: u64,
    /// Total neurons (active and inactive)
    pub neuron_count: usize,
    /// Active neurons
    pub active_neuron_count: usize,
    /// Total synapses
    pub synapse_count: usize,
    /// Events waiting in the queue
    pub queued_events: usize,
    /// Sum of active neuron health
    pub total_health: f32,
    /// Mean firing rate over active neurons
    pub mean_firing_rate: f32,
    /// Soma potentials of randomly probed active neurons
    pub probes: Vec<(NeuronId, f32)>,
    /// Per-synapse detail, present when configured
    pub synapses: Option<Vec<SynapseSample>>,
}

impl WorldSample {
    /// Collect a sample. `rng` is the metrics PRNG.
    pub(crate) fn collect(world: &World, rng: &mut WorldRng) -> Self {
        let active: Vec<&crate::neuron::Neuron> =
            world.neurons.values().filter(|n| n.active).collect();
        let total_health: f32 = active.iter().map(|n| n.health()).sum();
        let mean_firing_rate = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|n| n.firing_rate()).sum::<f32>() / active.len() as f32
        };

        // Reservoir-sample probe neurons
        let mut probes: Vec<(NeuronId, f32)> = Vec::with_capacity(PROBE_NEURONS);
        for (seen, neuron) in active.iter().enumerate() {
            if probes.len() < PROBE_NEURONS {
                probes.push((neuron.id, neuron.soma_potential()));
            } else {
                let slot = (rng.next_u64() % (seen as u64 + 1)) as usize;
                if slot < PROBE_NEURONS {
                    probes[slot] = (neuron.id, neuron.soma_potential());
                }
            }
        }
        probes.sort_by_key(|(id, _)| *id);

        let synapses = world.config.metrics_include_synapses.then(|| {
            world
                .synapses
                .values()
                .map(|s| SynapseSample {
                    id: s.id,
                    weight: s.weight,
                    fatigue: s.fatigue,
                })
                .collect()
        });

        Self {
            tick: world.current_tick,
            neuron_count: world.neurons.len(),
            active_neuron_count: active.len(),
            synapse_count: world.synapses.len(),
            queued_events: world.event_queue.len(),
            total_health,
            mean_firing_rate,
            probes,
            synapses,
        }
    }
}

/// Aggregates over every sample taken so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Samples taken over the world's lifetime
    pub samples_taken: u64,
    /// Highest active neuron count observed
    pub peak_active_neurons: usize,
    /// Tick of the most recent sample
    pub last_sample_tick: u64,
}

/// Fixed-capacity ring buffer of [`WorldSample`]s.
#[derive(Debug, Clone)]
pub struct MetricsRing {
    samples: Vec<Option<WorldSample>>,
    head: usize,
    wrapped: bool,
    summary: MetricsSummary,
}

impl MetricsRing {
    /// Create an empty ring with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![None; capacity.max(1)],
            head: 0,
            wrapped: false,
            summary: MetricsSummary::default(),
        }
    }

    /// Append a sample, advancing the head and marking wrap-around.
    pub fn push(&mut self, sample: WorldSample) {
        self.summary.samples_taken += 1;
        self.summary.peak_active_neurons = self
            .summary
            .peak_active_neurons
            .max(sample.active_neuron_count);
        self.summary.last_sample_tick = sample.tick;

        self.samples[self.head] = Some(sample);
        self.head += 1;
        if self.head == self.samples.len() {
            self.head = 0;
            self.wrapped = true;
        }
    }

    /// Retained samples, oldest first.
    pub fn samples(&self) -> Vec<WorldSample> {
        let mut out = Vec::new();
        let len = self.samples.len();
        let start = if self.wrapped { self.head } else { 0 };
        let count = if self.wrapped { len } else { self.head };
        for offset in 0..count {
            if let Some(sample) = &self.samples[(start + offset) % len] {
                out.push(sample.clone());
            }
        }
        out
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<WorldSample> {
        self.samples().pop()
    }

    /// Whether the ring has overwritten old samples.
    pub fn has_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Lifetime aggregates.
    pub fn summary(&self) -> MetricsSummary {
        self.summary
    }
}
