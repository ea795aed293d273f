//! Deterministic tick engine for the Hidra artificial-life platform
//!
//! A world holds neurons positioned in 3D space, directed synapses,
//! input/output nodes, global hormones, and a tick-keyed event queue.
//! Each step runs an eight-phase pipeline: drain due events, apply
//! passive decay, convert external inputs to pulses, integrate and
//! evaluate neurons in topological order, dispatch intra-tick events
//! (including the fuel-bounded gene VM), sweep deaths, commit future
//! events, and archive. Two worlds built from the same configuration,
//! genome, IO declarations, and seeds produce bit-identical state at
//! every tick, across save/restore boundaries included.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod brain;
pub mod condition;
pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod ids;
pub mod kahan;
pub mod logsink;
pub mod metrics;
pub mod neuron;
pub mod rng;
pub mod snapshot;
pub mod spatial;
pub mod synapse;
pub mod world;

mod bridge;
mod engine;
mod vm;

pub use brain::{
    ActivationFn, Brain, BrainInputSource, BrainNodeKind, BrainOutputAction, GateType,
    LogicGateBrain, NetworkBrain, PassThroughBrain,
};
pub use condition::{
    ComparisonOp, CompositeLogic, ConditionEndpoint, SynapseCondition, TemporalOp,
};
pub use config::WorldConfig;
pub use error::{Result, WorldError};
pub use event::{Event, EventPayload, EventQueue};
pub use handle::WorldHandle;
pub use ids::{EventId, InputId, NeuronId, NodeRef, OutputId, SynapseId, Vec3};
pub use kahan::KahanSum;
pub use logsink::{LogLevel, LogSink};
pub use metrics::{MetricsRing, MetricsSummary, WorldSample};
pub use neuron::Neuron;
pub use rng::WorldRng;
pub use snapshot::{WorldSnapshot, SNAPSHOT_VERSION};
pub use spatial::SpatialIndex;
pub use synapse::{SignalType, Synapse, SynapseProperty};
pub use vm::SecurityContext;
pub use world::{TickEvents, World};

/// Engine crate version for compatibility checking
pub const ENGINE_VERSION: u32 = 1;
