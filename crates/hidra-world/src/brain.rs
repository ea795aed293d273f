//! Per-neuron decision modules
//!
//! Every neuron carries a brain. The engine assembles an input vector
//! per the brain's input map, calls `evaluate`, and applies the output
//! map's actions to the world. The three variants are tagged enum
//! members with explicit dispatch.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorldError};

/// Where one brain input reads from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BrainInputSource {
    /// The potential carried by the triggering activation event
    ActivationPotential,
    /// The neuron's current dendritic plus soma potential
    TotalPotential,
    /// The neuron's health
    Health,
    /// The neuron's age in ticks
    Age,
    /// The neuron's firing-rate EMA
    FiringRate,
    /// A local variable by index
    LocalVar(usize),
    /// A global hormone by index
    Hormone(usize),
    /// The previous source value of the k-th incoming synapse (id order)
    IncomingSynapse(usize),
    /// A fixed constant
    Constant(f32),
}

/// What one brain output does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrainOutputAction {
    /// Override the value the neuron transmits this firing
    SetOutput,
    /// Queue a user gene on this neuron for the next tick; the gene id
    /// is `|value| + system_gene_count`
    ExecuteGene,
    /// Translate the neuron along the X axis by the output value
    MoveX,
    /// Translate the neuron along the Y axis by the output value
    MoveY,
    /// Translate the neuron along the Z axis by the output value
    MoveZ,
}

/// Logic gate types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateType {
    /// True when all inputs are true
    And,
    /// True when any input is true
    Or,
    /// Negated And
    Nand,
    /// Negated Or
    Nor,
    /// True when an odd number of inputs are true
    Xor,
}

impl GateType {
    fn apply(self, inputs: &[bool]) -> bool {
        match self {
            GateType::And => inputs.iter().all(|&b| b),
            GateType::Or => inputs.iter().any(|&b| b),
            GateType::Nand => !inputs.iter().all(|&b| b),
            GateType::Nor => !inputs.iter().any(|&b| b),
            GateType::Xor => inputs.iter().filter(|&&b| b).count() % 2 == 1,
        }
    }
}

/// Activation functions for network brain nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFn {
    /// Hyperbolic tangent
    Tanh,
    /// max(0, x)
    Relu,
    /// 1 / (1 + e^-x)
    Sigmoid,
    /// x unchanged
    Identity,
}

impl ActivationFn {
    fn apply(self, x: f32) -> f32 {
        match self {
            ActivationFn::Tanh => x.tanh(),
            ActivationFn::Relu => x.max(0.0),
            ActivationFn::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationFn::Identity => x,
        }
    }
}

/// Role of a network brain node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrainNodeKind {
    /// Reads from a [`BrainInputSource`]
    Input,
    /// Internal node
    Hidden,
    /// Drives a [`BrainOutputAction`]
    Output,
}

/// One node of a network brain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainNode {
    /// Node id, unique within the brain
    pub id: u32,
    /// Node role
    pub kind: BrainNodeKind,
    /// Additive bias
    pub bias: f32,
    /// Activation applied to the biased sum
    pub activation: ActivationFn,
    /// Input source (Input nodes only)
    pub source: Option<BrainInputSource>,
    /// Output action (Output nodes only)
    pub action: Option<BrainOutputAction>,
}

/// One weighted connection of a network brain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrainConnection {
    /// Source node id
    pub from: u32,
    /// Target node id
    pub to: u32,
    /// Connection weight
    pub weight: f32,
}

/// Pass-through brain: activation potential in, transmitted value out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassThroughBrain;

/// Thresholded logic gate with optional flip-flop memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicGateBrain {
    /// Gate applied to the thresholded inputs
    pub gate: GateType,
    /// Values at or above this threshold read as true
    pub threshold: f32,
    /// When set, a true gate result toggles the memory bit and the
    /// memory bit is emitted instead of the gate result
    pub use_memory: bool,
    /// Flip-flop state
    pub memory: bool,
    /// Input sources feeding the gate
    pub inputs: Vec<BrainInputSource>,
}

impl LogicGateBrain {
    /// Create a gate brain reading the activation potential.
    pub fn new(gate: GateType, threshold: f32) -> Self {
        Self {
            gate,
            threshold,
            use_memory: false,
            memory: false,
            inputs: vec![BrainInputSource::ActivationPotential],
        }
    }
}

/// Small explicit feed-forward network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkBrain {
    /// Node table
    pub nodes: Vec<BrainNode>,
    /// Connection list
    pub connections: Vec<BrainConnection>,
    next_node_id: u32,
}

impl NetworkBrain {
    /// Create an empty network brain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its id.
    pub fn add_node(
        &mut self,
        kind: BrainNodeKind,
        bias: f32,
        activation: ActivationFn,
        source: Option<BrainInputSource>,
        action: Option<BrainOutputAction>,
    ) -> u32 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.push(BrainNode {
            id,
            kind,
            bias,
            activation,
            source,
            action,
        });
        id
    }

    /// Add a connection. Rejected when either endpoint is missing or the
    /// edge would close a cycle.
    pub fn add_connection(&mut self, from: u32, to: u32, weight: f32) -> Result<()> {
        let exists = |id: u32| self.nodes.iter().any(|n| n.id == id);
        if !exists(from) || !exists(to) {
            return Err(WorldError::invalid_endpoint(format!(
                "brain connection {from} -> {to} references a missing node"
            )));
        }
        if from == to || self.reaches(to, from) {
            return Err(WorldError::CyclicBrainConnection { from, to });
        }
        self.connections.push(BrainConnection { from, to, weight });
        Ok(())
    }

    /// Whether `to` is reachable from `from` along existing connections.
    fn reaches(&self, from: u32, to: u32) -> bool {
        let mut stack = vec![from];
        let mut seen = Vec::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if seen.contains(&node) {
                continue;
            }
            seen.push(node);
            stack.extend(
                self.connections
                    .iter()
                    .filter(|c| c.from == node)
                    .map(|c| c.to),
            );
        }
        false
    }

    fn evaluate(&self, inputs: &[f32]) -> Vec<f32> {
        // Feed-forward over the acyclic graph: repeatedly settle nodes
        // whose predecessors are all settled. The graph is guaranteed
        // acyclic by add_connection, so this terminates.
        let index_of = |id: u32| self.nodes.iter().position(|n| n.id == id);
        let mut values = vec![0.0f32; self.nodes.len()];
        let mut settled = vec![false; self.nodes.len()];

        let mut input_cursor = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.kind == BrainNodeKind::Input {
                values[i] = inputs.get(input_cursor).copied().unwrap_or(0.0);
                input_cursor += 1;
                settled[i] = true;
            }
        }

        loop {
            let mut progressed = false;
            for (i, node) in self.nodes.iter().enumerate() {
                if settled[i] {
                    continue;
                }
                let incoming: Vec<&BrainConnection> = self
                    .connections
                    .iter()
                    .filter(|c| c.to == node.id)
                    .collect();
                let ready = incoming
                    .iter()
                    .all(|c| index_of(c.from).map(|j| settled[j]).unwrap_or(true));
                if !ready {
                    continue;
                }
                let mut sum = node.bias;
                for connection in incoming {
                    if let Some(j) = index_of(connection.from) {
                        sum += connection.weight * values[j];
                    }
                }
                values[i] = node.activation.apply(sum);
                settled[i] = true;
                progressed = true;
            }
            if !progressed {
                break;
            }
        }

        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == BrainNodeKind::Output)
            .map(|(i, _)| values[i])
            .collect()
    }
}

/// A neuron's decision module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Brain {
    /// Identity: transmit the activation potential
    PassThrough(PassThroughBrain),
    /// Thresholded boolean gate with optional memory
    LogicGate(LogicGateBrain),
    /// Explicit acyclic feed-forward network
    Network(NetworkBrain),
}

impl Default for Brain {
    fn default() -> Self {
        Brain::PassThrough(PassThroughBrain)
    }
}

impl Brain {
    /// The input sources this brain wants, in evaluation order.
    pub fn input_map(&self) -> Vec<BrainInputSource> {
        match self {
            Brain::PassThrough(_) => vec![BrainInputSource::ActivationPotential],
            Brain::LogicGate(gate) => gate.inputs.clone(),
            Brain::Network(net) => net
                .nodes
                .iter()
                .filter(|n| n.kind == BrainNodeKind::Input)
                .map(|n| n.source.unwrap_or(BrainInputSource::Constant(0.0)))
                .collect(),
        }
    }

    /// The output actions this brain drives, matching `evaluate` order.
    pub fn output_map(&self) -> Vec<BrainOutputAction> {
        match self {
            Brain::PassThrough(_) => vec![BrainOutputAction::SetOutput],
            Brain::LogicGate(_) => vec![BrainOutputAction::SetOutput],
            Brain::Network(net) => net
                .nodes
                .iter()
                .filter(|n| n.kind == BrainNodeKind::Output)
                .map(|n| n.action.unwrap_or(BrainOutputAction::SetOutput))
                .collect(),
        }
    }

    /// Evaluate the brain over an assembled input vector.
    pub fn evaluate(&mut self, inputs: &[f32]) -> Vec<f32> {
        match self {
            Brain::PassThrough(_) => vec![inputs.first().copied().unwrap_or(0.0)],
            Brain::LogicGate(gate) => {
                let bits: Vec<bool> = inputs.iter().map(|&v| v >= gate.threshold).collect();
                let result = gate.gate.apply(&bits);
                let out = if gate.use_memory {
                    if result {
                        gate.memory = !gate.memory;
                    }
                    gate.memory
                } else {
                    result
                };
                vec![if out { 1.0 } else { 0.0 }]
            }
            Brain::Network(net) => net.evaluate(inputs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through() {
        let mut brain = Brain::default();
        assert_eq!(brain.input_map(), vec![BrainInputSource::ActivationPotential]);
        assert_eq!(brain.evaluate(&[2.5]), vec![2.5]);
        assert_eq!(brain.evaluate(&[]), vec![0.0]);
    }

    #[test]
    fn test_logic_gates() {
        for (gate, inputs, expected) in [
            (GateType::And, vec![1.0, 1.0], 1.0),
            (GateType::And, vec![1.0, 0.0], 0.0),
            (GateType::Or, vec![0.0, 1.0], 1.0),
            (GateType::Nand, vec![1.0, 1.0], 0.0),
            (GateType::Nor, vec![0.0, 0.0], 1.0),
            (GateType::Xor, vec![1.0, 1.0], 0.0),
            (GateType::Xor, vec![1.0, 0.0], 1.0),
        ] {
            let mut gate_brain = LogicGateBrain::new(gate, 0.5);
            gate_brain.inputs = vec![
                BrainInputSource::ActivationPotential,
                BrainInputSource::Constant(0.0),
            ];
            let mut brain = Brain::LogicGate(gate_brain);
            assert_eq!(brain.evaluate(&inputs), vec![expected], "{gate:?} {inputs:?}");
        }
    }

    #[test]
    fn test_flip_flop_memory() {
        let mut gate = LogicGateBrain::new(GateType::Or, 0.5);
        gate.use_memory = true;
        let mut brain = Brain::LogicGate(gate);

        // Each true pulse toggles the stored bit
        assert_eq!(brain.evaluate(&[1.0]), vec![1.0]);
        assert_eq!(brain.evaluate(&[0.0]), vec![1.0]);
        assert_eq!(brain.evaluate(&[1.0]), vec![0.0]);
    }

    #[test]
    fn test_network_feed_forward() {
        let mut net = NetworkBrain::new();
        let input = net.add_node(
            BrainNodeKind::Input,
            0.0,
            ActivationFn::Identity,
            Some(BrainInputSource::ActivationPotential),
            None,
        );
        let hidden = net.add_node(BrainNodeKind::Hidden, 1.0, ActivationFn::Relu, None, None);
        let output = net.add_node(
            BrainNodeKind::Output,
            0.0,
            ActivationFn::Identity,
            None,
            Some(BrainOutputAction::SetOutput),
        );
        net.add_connection(input, hidden, 2.0).unwrap();
        net.add_connection(hidden, output, 0.5).unwrap();

        let mut brain = Brain::Network(net);
        // relu(1 + 2*3) * 0.5 = 3.5
        assert_eq!(brain.evaluate(&[3.0]), vec![3.5]);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut net = NetworkBrain::new();
        let a = net.add_node(BrainNodeKind::Hidden, 0.0, ActivationFn::Identity, None, None);
        let b = net.add_node(BrainNodeKind::Hidden, 0.0, ActivationFn::Identity, None, None);
        net.add_connection(a, b, 1.0).unwrap();
        let err = net.add_connection(b, a, 1.0).unwrap_err();
        assert!(matches!(err, WorldError::CyclicBrainConnection { .. }));
        // Self-loops are cycles too
        assert!(net.add_connection(a, a, 1.0).is_err());
        // State unchanged
        assert_eq!(net.connections.len(), 1);
    }

    #[test]
    fn test_missing_node_rejected() {
        let mut net = NetworkBrain::new();
        let a = net.add_node(BrainNodeKind::Hidden, 0.0, ActivationFn::Identity, None, None);
        assert!(net.add_connection(a, 99, 1.0).is_err());
    }

    #[test]
    fn test_input_output_maps_follow_node_order() {
        let mut net = NetworkBrain::new();
        net.add_node(
            BrainNodeKind::Input,
            0.0,
            ActivationFn::Identity,
            Some(BrainInputSource::Health),
            None,
        );
        net.add_node(
            BrainNodeKind::Input,
            0.0,
            ActivationFn::Identity,
            Some(BrainInputSource::Constant(4.0)),
            None,
        );
        net.add_node(
            BrainNodeKind::Output,
            0.0,
            ActivationFn::Identity,
            None,
            Some(BrainOutputAction::MoveX),
        );
        let brain = Brain::Network(net);
        assert_eq!(
            brain.input_map(),
            vec![
                BrainInputSource::Health,
                BrainInputSource::Constant(4.0)
            ]
        );
        assert_eq!(brain.output_map(), vec![BrainOutputAction::MoveX]);
    }

    #[test]
    fn test_activation_functions() {
        assert_eq!(ActivationFn::Relu.apply(-2.0), 0.0);
        assert_eq!(ActivationFn::Relu.apply(2.0), 2.0);
        assert_eq!(ActivationFn::Identity.apply(-3.5), -3.5);
        assert!((ActivationFn::Sigmoid.apply(0.0) - 0.5).abs() < 1e-6);
        assert!(ActivationFn::Tanh.apply(100.0) <= 1.0);
    }
}
