//! World configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorldError};

/// Recognized world options.
///
/// Unknown keys in a serialized configuration are rejected at the
/// deserialization boundary; every field has a documented default so a
/// partial configuration (e.g. a TOML file with only overrides) loads
/// cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Health decrement applied to every active neuron each tick
    pub metabolic_tax_per_tick: f32,
    /// Starting health on neuron creation
    pub initial_neuron_health: f32,
    /// Starting soma potential on neuron creation
    pub initial_potential: f32,
    /// Soma potential retained per tick is `1 - rate`
    pub default_decay_rate: f32,
    /// Base firing threshold at creation
    pub default_firing_threshold: f32,
    /// Ticks to wait after firing
    pub default_refractory_period: f32,
    /// Increment added to the adaptive threshold on firing
    pub default_threshold_adaptation_factor: f32,
    /// Per-tick recovery factor for the adaptive threshold
    pub default_threshold_recovery_rate: f32,
    /// Firing-rate EMA retention; closer to 1 means slower changes
    pub firing_rate_ma_weight: f32,
    /// Default neighborhood radius; spatial cell edge is twice this
    pub competition_radius: f32,
    /// Count of reserved system genes at the head of the genome
    pub system_gene_count: usize,
    /// Whether metrics sampling runs at all
    pub metrics_enabled: bool,
    /// Sample every this many ticks
    pub metrics_collection_interval: u64,
    /// Ring buffer capacity in samples
    pub metrics_ring_capacity: usize,
    /// Whether samples carry per-synapse detail
    pub metrics_include_synapses: bool,
    /// First word of the primary PRNG seed
    pub seed0: u64,
    /// Second word of the primary PRNG seed
    pub seed1: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            metabolic_tax_per_tick: 0.01,
            initial_neuron_health: 100.0,
            initial_potential: 0.0,
            default_decay_rate: 0.1,
            default_firing_threshold: 1.0,
            default_refractory_period: 1.0,
            default_threshold_adaptation_factor: 0.05,
            default_threshold_recovery_rate: 0.05,
            firing_rate_ma_weight: 0.95,
            competition_radius: 5.0,
            system_gene_count: 4,
            metrics_enabled: true,
            metrics_collection_interval: 10,
            metrics_ring_capacity: 256,
            metrics_include_synapses: false,
            seed0: 0x8A5C_D789_635D_2DFF,
            seed1: 0x1218_03FD_32BA_4F95,
        }
    }
}

impl WorldConfig {
    /// Validate option ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_decay_rate) {
            return Err(WorldError::invalid_parameter(
                "default_decay_rate",
                self.default_decay_rate.to_string(),
                "0.0..=1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.firing_rate_ma_weight) {
            return Err(WorldError::invalid_parameter(
                "firing_rate_ma_weight",
                self.firing_rate_ma_weight.to_string(),
                "0.0..=1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.default_threshold_recovery_rate) {
            return Err(WorldError::invalid_parameter(
                "default_threshold_recovery_rate",
                self.default_threshold_recovery_rate.to_string(),
                "0.0..=1.0",
            ));
        }
        if self.competition_radius <= 0.0 {
            return Err(WorldError::invalid_parameter(
                "competition_radius",
                self.competition_radius.to_string(),
                "> 0.0",
            ));
        }
        if self.metrics_collection_interval == 0 {
            return Err(WorldError::invalid_parameter(
                "metrics_collection_interval",
                "0",
                "> 0",
            ));
        }
        if self.metrics_ring_capacity == 0 {
            return Err(WorldError::invalid_parameter(
                "metrics_ring_capacity",
                "0",
                "> 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(WorldConfig::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut config = WorldConfig::default();
        config.default_decay_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = WorldConfig::default();
        config.competition_radius = 0.0;
        assert!(config.validate().is_err());

        let mut config = WorldConfig::default();
        config.metrics_ring_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bincode_roundtrip() {
        let config = WorldConfig::default();
        let bytes = bincode::serialize(&config).unwrap();
        let back: WorldConfig = bincode::deserialize(&bytes).unwrap();
        assert_eq!(config, back);
    }
}
