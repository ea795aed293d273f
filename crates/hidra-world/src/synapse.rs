//! Directed synapses and signal delivery modes

use serde::{Deserialize, Serialize};

use crate::condition::SynapseCondition;
use crate::ids::{NodeRef, SynapseId};

/// When and how a source value reaches the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    /// Pulse delivered on the next delivery opportunity; pulses to
    /// output nodes are smoothed by the synapse parameter
    Immediate,
    /// Pulse delivered after `parameter` additional ticks
    Delayed,
    /// Continuous contribution to the target's dendritic baseline
    Persistent,
    /// One-shot delivery on the tick after the trigger
    Transient,
}

impl SignalType {
    /// Decode from a wire/gene discriminant.
    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => SignalType::Immediate,
            1 => SignalType::Delayed,
            2 => SignalType::Persistent,
            3 => SignalType::Transient,
            _ => return None,
        })
    }
}

/// Mutable synapse properties addressable from gene code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynapseProperty {
    /// Transmission weight
    Weight,
    /// Type-specific parameter (delay ticks, output smoothing)
    Parameter,
    /// Fatigue accumulation rate
    FatigueRate,
    /// Fatigue recovery per tick
    FatigueRecoveryRate,
}

impl SynapseProperty {
    /// Decode from a wire/gene discriminant.
    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => SynapseProperty::Weight,
            1 => SynapseProperty::Parameter,
            2 => SynapseProperty::FatigueRate,
            3 => SynapseProperty::FatigueRecoveryRate,
            _ => return None,
        })
    }
}

/// A directed synapse between two world entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    /// Synapse id
    pub id: SynapseId,
    /// Inactive synapses are swept at the end of their tick
    pub active: bool,
    /// Source endpoint
    pub source: NodeRef,
    /// Target endpoint
    pub target: NodeRef,
    /// Delivery mode
    pub signal_type: SignalType,
    /// Transmission weight
    pub weight: f32,
    /// Delay ticks (Delayed) or output smoothing factor (Immediate)
    pub parameter: f32,
    /// Recorded value for Persistent/Transient delivery
    pub persistent_value: f32,
    /// Whether `persistent_value` has ever been written
    pub persistent_set: bool,
    /// Tick at which a pending Transient delivery fires
    pub transient_trigger_tick: Option<u64>,
    /// Fatigue level in [0, 1]; attenuates transmissions
    pub fatigue: f32,
    /// Fatigue gained per unit of transmitted magnitude
    pub fatigue_rate: f32,
    /// Fatigue recovered per tick
    pub fatigue_recovery_rate: f32,
    /// Optional transmission predicate
    pub condition: Option<SynapseCondition>,
    /// Source value recorded at the previous condition evaluation
    pub previous_source_value: f32,
    /// Hold counter for Sustained temporal conditions
    pub sustained_counter: u32,
}

impl Synapse {
    /// Create a synapse with neutral dynamics.
    pub fn new(
        id: SynapseId,
        source: NodeRef,
        target: NodeRef,
        signal_type: SignalType,
        weight: f32,
    ) -> Self {
        Self {
            id,
            active: true,
            source,
            target,
            signal_type,
            weight,
            parameter: 0.0,
            persistent_value: 0.0,
            persistent_set: false,
            transient_trigger_tick: None,
            fatigue: 0.0,
            fatigue_rate: 0.0,
            fatigue_recovery_rate: 0.0,
            condition: None,
            previous_source_value: 0.0,
            sustained_counter: 0,
        }
    }

    /// The entity whose owned list carries this synapse: the source if
    /// it is a neuron, otherwise the target.
    pub fn owner(&self) -> NodeRef {
        match self.source {
            NodeRef::Neuron(_) => self.source,
            _ => self.target,
        }
    }

    /// Set an addressable property.
    pub fn set_property(&mut self, property: SynapseProperty, value: f32) {
        match property {
            SynapseProperty::Weight => self.weight = value,
            SynapseProperty::Parameter => self.parameter = value,
            SynapseProperty::FatigueRate => self.fatigue_rate = value,
            SynapseProperty::FatigueRecoveryRate => self.fatigue_recovery_rate = value,
        }
    }

    /// Accumulate fatigue for a transmission of `transmitted`.
    pub fn accumulate_fatigue(&mut self, transmitted: f32) {
        self.fatigue = (self.fatigue + transmitted.abs() * self.fatigue_rate).min(1.0);
    }

    /// Recover fatigue by the per-tick recovery rate.
    pub fn recover_fatigue(&mut self) {
        self.fatigue = (self.fatigue - self.fatigue_recovery_rate).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{InputId, NeuronId, OutputId};

    #[test]
    fn test_owner_prefers_neuron_source() {
        let s = Synapse::new(
            SynapseId::new(1),
            NodeRef::Neuron(NeuronId::new(3)),
            NodeRef::Neuron(NeuronId::new(4)),
            SignalType::Immediate,
            1.0,
        );
        assert_eq!(s.owner(), NodeRef::Neuron(NeuronId::new(3)));

        let s = Synapse::new(
            SynapseId::new(2),
            NodeRef::Input(InputId::new(100)),
            NodeRef::Neuron(NeuronId::new(4)),
            SignalType::Immediate,
            1.0,
        );
        assert_eq!(s.owner(), NodeRef::Neuron(NeuronId::new(4)));

        let s = Synapse::new(
            SynapseId::new(3),
            NodeRef::Neuron(NeuronId::new(3)),
            NodeRef::Output(OutputId::new(200)),
            SignalType::Immediate,
            1.0,
        );
        assert_eq!(s.owner(), NodeRef::Neuron(NeuronId::new(3)));
    }

    #[test]
    fn test_fatigue_bounds() {
        let mut s = Synapse::new(
            SynapseId::new(1),
            NodeRef::Neuron(NeuronId::new(1)),
            NodeRef::Neuron(NeuronId::new(2)),
            SignalType::Immediate,
            1.0,
        );
        s.fatigue_rate = 10.0;
        s.accumulate_fatigue(100.0);
        assert_eq!(s.fatigue, 1.0);

        s.fatigue_recovery_rate = 0.4;
        s.recover_fatigue();
        s.recover_fatigue();
        s.recover_fatigue();
        assert_eq!(s.fatigue, 0.0);
    }

    #[test]
    fn test_set_property() {
        let mut s = Synapse::new(
            SynapseId::new(1),
            NodeRef::Neuron(NeuronId::new(1)),
            NodeRef::Neuron(NeuronId::new(2)),
            SignalType::Delayed,
            1.0,
        );
        s.set_property(SynapseProperty::Weight, 0.5);
        s.set_property(SynapseProperty::Parameter, 3.0);
        assert_eq!(s.weight, 0.5);
        assert_eq!(s.parameter, 3.0);
    }
}
