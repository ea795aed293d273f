//! Neurons and their local variable layout
//!
//! Every neuron carries a fixed-length vector of 256 local variables.
//! Indices 0..=238 are user-writable (gene code and the control surface
//! may store there); 239..=245 are engine-owned state that only the
//! step pipeline mutates; the remainder is reserved.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::brain::Brain;
use crate::config::WorldConfig;
use crate::ids::{NeuronId, SynapseId, Vec3};

/// Fixed local variable vector length.
pub const LVAR_COUNT: usize = 256;
/// Highest user-writable index (inclusive).
pub const LVAR_USER_MAX: usize = 238;

/// Firing threshold
pub const LVAR_FIRING_THRESHOLD: usize = 0;
/// Soma decay rate; potential retained per tick is `1 - rate`
pub const LVAR_DECAY_RATE: usize = 1;
/// Refractory period in ticks
pub const LVAR_REFRACTORY_PERIOD: usize = 2;
/// Adaptive threshold increment applied on firing
pub const LVAR_THRESHOLD_ADAPTATION: usize = 3;
/// Per-tick adaptive threshold recovery rate
pub const LVAR_THRESHOLD_RECOVERY: usize = 4;
/// Fuel granted to genes executing on this neuron
pub const LVAR_GENE_FUEL: usize = 5;

/// Engine-owned: refractory ticks remaining
pub const LVAR_REFRACTORY_LEFT: usize = 239;
/// Engine-owned: firing rate EMA
pub const LVAR_FIRING_RATE: usize = 240;
/// Engine-owned: dendritic potential computed each tick
pub const LVAR_DENDRITIC_POTENTIAL: usize = 241;
/// Engine-owned: soma potential
pub const LVAR_SOMA_POTENTIAL: usize = 242;
/// Engine-owned: health
pub const LVAR_HEALTH: usize = 243;
/// Engine-owned: age in ticks
pub const LVAR_AGE: usize = 244;
/// Engine-owned: adaptive threshold
pub const LVAR_ADAPTIVE_THRESHOLD: usize = 245;

/// Gene fuel granted to freshly created neurons.
pub const DEFAULT_NEURON_GENE_FUEL: f32 = 1000.0;

/// A positioned neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    /// Neuron id
    pub id: NeuronId,
    /// Inactive neurons are skipped by every phase
    pub active: bool,
    /// Position in world space
    pub position: Vec3,
    /// Local variable vector, always [`LVAR_COUNT`] long
    lvars: Vec<f32>,
    /// Decision module
    pub brain: Brain,
    /// Synapses owned by this neuron, ascending by id
    pub owned_synapses: SmallVec<[SynapseId; 8]>,
    /// Set when health reaches zero or deactivation was requested;
    /// swept in the deactivation phase
    pub marked_for_death: bool,
    /// The value this neuron transmitted at its most recent firing
    pub last_output: f32,
}

impl Neuron {
    /// Create a neuron at `position` with config-derived defaults.
    pub fn new(id: NeuronId, position: Vec3, config: &WorldConfig) -> Self {
        let mut lvars = vec![0.0f32; LVAR_COUNT];
        lvars[LVAR_FIRING_THRESHOLD] = config.default_firing_threshold;
        lvars[LVAR_DECAY_RATE] = config.default_decay_rate;
        lvars[LVAR_REFRACTORY_PERIOD] = config.default_refractory_period;
        lvars[LVAR_THRESHOLD_ADAPTATION] = config.default_threshold_adaptation_factor;
        lvars[LVAR_THRESHOLD_RECOVERY] = config.default_threshold_recovery_rate;
        lvars[LVAR_GENE_FUEL] = DEFAULT_NEURON_GENE_FUEL;
        lvars[LVAR_SOMA_POTENTIAL] = config.initial_potential;
        lvars[LVAR_HEALTH] = config.initial_neuron_health;

        Self {
            id,
            active: true,
            position,
            lvars,
            brain: Brain::default(),
            owned_synapses: SmallVec::new(),
            marked_for_death: false,
            last_output: 0.0,
        }
    }

    /// Read a local variable; out-of-range reads return 0.
    pub fn lvar(&self, index: usize) -> f32 {
        self.lvars.get(index).copied().unwrap_or(0.0)
    }

    /// Full local variable slice.
    pub fn lvars(&self) -> &[f32] {
        &self.lvars
    }

    /// Store into the user-writable region. Returns false (leaving
    /// state unchanged) for engine-owned or out-of-range indices.
    pub fn store_user_lvar(&mut self, index: usize, value: f32) -> bool {
        if index > LVAR_USER_MAX {
            return false;
        }
        self.lvars[index] = value;
        true
    }

    /// Engine-side store, allowed anywhere in the vector.
    pub(crate) fn store_system_lvar(&mut self, index: usize, value: f32) {
        debug_assert!(index < LVAR_COUNT);
        self.lvars[index] = value;
    }

    /// Insert an owned synapse id, keeping the list sorted.
    pub fn adopt_synapse(&mut self, synapse_id: SynapseId) {
        if let Err(at) = self.owned_synapses.binary_search(&synapse_id) {
            self.owned_synapses.insert(at, synapse_id);
        }
    }

    /// Remove an owned synapse id.
    pub fn disown_synapse(&mut self, synapse_id: SynapseId) {
        if let Ok(at) = self.owned_synapses.binary_search(&synapse_id) {
            self.owned_synapses.remove(at);
        }
    }

    /// Firing threshold.
    pub fn firing_threshold(&self) -> f32 {
        self.lvars[LVAR_FIRING_THRESHOLD]
    }

    /// Soma potential.
    pub fn soma_potential(&self) -> f32 {
        self.lvars[LVAR_SOMA_POTENTIAL]
    }

    /// Dendritic potential computed for the current tick.
    pub fn dendritic_potential(&self) -> f32 {
        self.lvars[LVAR_DENDRITIC_POTENTIAL]
    }

    /// Dendritic plus soma potential.
    pub fn total_potential(&self) -> f32 {
        self.dendritic_potential() + self.soma_potential()
    }

    /// Current health.
    pub fn health(&self) -> f32 {
        self.lvars[LVAR_HEALTH]
    }

    /// Age in ticks.
    pub fn age(&self) -> f32 {
        self.lvars[LVAR_AGE]
    }

    /// Firing-rate EMA.
    pub fn firing_rate(&self) -> f32 {
        self.lvars[LVAR_FIRING_RATE]
    }

    /// Adaptive threshold component.
    pub fn adaptive_threshold(&self) -> f32 {
        self.lvars[LVAR_ADAPTIVE_THRESHOLD]
    }

    /// Refractory ticks remaining.
    pub fn refractory_left(&self) -> f32 {
        self.lvars[LVAR_REFRACTORY_LEFT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neuron() -> Neuron {
        Neuron::new(NeuronId::new(1), Vec3::ZERO, &WorldConfig::default())
    }

    #[test]
    fn test_creation_defaults() {
        let n = neuron();
        assert!(n.active);
        assert_eq!(n.lvars().len(), LVAR_COUNT);
        assert_eq!(n.firing_threshold(), 1.0);
        assert_eq!(n.health(), 100.0);
        assert_eq!(n.lvar(LVAR_GENE_FUEL), DEFAULT_NEURON_GENE_FUEL);
        assert_eq!(n.age(), 0.0);
    }

    #[test]
    fn test_user_region_boundary() {
        let mut n = neuron();
        assert!(n.store_user_lvar(0, 2.0));
        assert!(n.store_user_lvar(LVAR_USER_MAX, 3.0));
        assert!(!n.store_user_lvar(LVAR_REFRACTORY_LEFT, 9.0));
        assert!(!n.store_user_lvar(LVAR_HEALTH, 9.0));
        assert!(!n.store_user_lvar(LVAR_COUNT, 9.0));
        // Refused writes leave state unchanged
        assert_eq!(n.health(), 100.0);
    }

    #[test]
    fn test_out_of_range_read_is_neutral() {
        assert_eq!(neuron().lvar(9999), 0.0);
    }

    #[test]
    fn test_owned_synapse_list_stays_sorted() {
        let mut n = neuron();
        for raw in [5u64, 1, 9, 3, 9] {
            n.adopt_synapse(SynapseId::new(raw));
        }
        let raws: Vec<u64> = n.owned_synapses.iter().map(|s| s.raw()).collect();
        assert_eq!(raws, vec![1, 3, 5, 9]);

        n.disown_synapse(SynapseId::new(5));
        let raws: Vec<u64> = n.owned_synapses.iter().map(|s| s.raw()).collect();
        assert_eq!(raws, vec![1, 3, 9]);
    }
}
