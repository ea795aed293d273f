//! Identifier types for world entities
//!
//! Each entity family draws from its own monotonic 64-bit counter;
//! identifiers are never reused within a world.

use core::fmt;
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new id from its raw value
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the raw id value
            pub const fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a neuron
    NeuronId,
    "N"
);
entity_id!(
    /// Unique identifier for a synapse
    SynapseId,
    "S"
);
entity_id!(
    /// Unique identifier for a scheduled event
    EventId,
    "E"
);
entity_id!(
    /// Identifier for an externally driven input node
    InputId,
    "I"
);
entity_id!(
    /// Identifier for an engine-written output node
    OutputId,
    "O"
);

/// A reference to any pulse endpoint in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeRef {
    /// A neuron
    Neuron(NeuronId),
    /// An input node
    Input(InputId),
    /// An output node
    Output(OutputId),
}

impl NodeRef {
    /// The neuron id, if this reference names a neuron.
    pub fn as_neuron(&self) -> Option<NeuronId> {
        match self {
            NodeRef::Neuron(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Neuron(id) => write!(f, "{id}"),
            NodeRef::Input(id) => write!(f, "{id}"),
            NodeRef::Output(id) => write!(f, "{id}"),
        }
    }
}

/// A position or translation in the world's 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// The origin / zero vector.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Construct from components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared Euclidean distance to another point.
    pub fn distance_squared(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Component-wise addition.
    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}
