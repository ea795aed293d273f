//! Error types for the world engine

use thiserror::Error;

/// Result type for world operations
pub type Result<T> = std::result::Result<T, WorldError>;

/// Errors that can occur in the world engine
#[derive(Error, Debug)]
pub enum WorldError {
    /// Genome compilation failed
    #[error("Genome error: {source}")]
    Genome {
        #[from]
        /// Source genome error
        source: hidra_genome::GenomeError,
    },

    /// The world was halted by a previous phase failure
    #[error("World is halted: {reason}")]
    Halted {
        /// Phase-tagged reason recorded at halt time
        reason: String,
    },

    /// Neuron not found
    #[error("Neuron {neuron_id} not found")]
    NeuronNotFound {
        /// Neuron id that was not found
        neuron_id: u64,
    },

    /// Synapse not found
    #[error("Synapse {synapse_id} not found")]
    SynapseNotFound {
        /// Synapse id that was not found
        synapse_id: u64,
    },

    /// Input node not found
    #[error("Input node {input_id} not found")]
    InputNotFound {
        /// Input node id that was not found
        input_id: u64,
    },

    /// Output node not found
    #[error("Output node {output_id} not found")]
    OutputNotFound {
        /// Output node id that was not found
        output_id: u64,
    },

    /// A referenced entity does not exist or is the wrong kind
    #[error("Invalid endpoint: {reason}")]
    InvalidEndpoint {
        /// Reason the endpoint was rejected
        reason: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// A write into the engine-owned local variable region was refused
    #[error("Local variable {index} is not user-writable")]
    LocalVariableReadOnly {
        /// Offending index
        index: usize,
    },

    /// A brain connection request would create a cycle
    #[error("Brain connection {from} -> {to} would create a cycle")]
    CyclicBrainConnection {
        /// Source brain node
        from: u32,
        /// Target brain node
        to: u32,
    },

    /// A phase of the step pipeline failed; the world is now halted
    #[error("Phase '{phase}' failed: {reason}")]
    PhaseFailure {
        /// Phase name
        phase: &'static str,
        /// Failure description
        reason: String,
    },

    /// Snapshot serialization or restore failed
    #[error("Snapshot error: {reason}")]
    Snapshot {
        /// Failure description
        reason: String,
    },
}

impl WorldError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create an invalid endpoint error
    pub fn invalid_endpoint(reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            reason: reason.into(),
        }
    }

    /// Create a snapshot error
    pub fn snapshot(reason: impl Into<String>) -> Self {
        Self::Snapshot {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorldError::NeuronNotFound { neuron_id: 42 };
        assert!(format!("{}", err).contains("Neuron 42 not found"));

        let err = WorldError::invalid_parameter("weight", "NaN", "finite");
        assert!(matches!(err, WorldError::InvalidParameter { .. }));
    }
}
