//! Synapse transmission predicates
//!
//! Conditions gate whether a synapse transmits. Each variant is
//! evaluated against a [`ConditionContext`] assembled by the engine;
//! out-of-range indices and missing endpoints evaluate to false and are
//! logged rather than failing the tick.

use serde::{Deserialize, Serialize};

/// Comparison tolerance for equality tests.
pub const COMPARISON_EPSILON: f32 = 1e-6;

/// Comparison operator shared by the scalar condition variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Strictly less than
    Less,
    /// Strictly greater than
    Greater,
    /// Less than or equal
    LessOrEqual,
    /// Greater than or equal
    GreaterOrEqual,
    /// Equal within [`COMPARISON_EPSILON`]
    Equal,
    /// Not equal within [`COMPARISON_EPSILON`]
    NotEqual,
}

impl ComparisonOp {
    /// Apply the operator.
    pub fn apply(self, left: f32, right: f32) -> bool {
        match self {
            ComparisonOp::Less => left < right,
            ComparisonOp::Greater => left > right,
            ComparisonOp::LessOrEqual => left <= right,
            ComparisonOp::GreaterOrEqual => left >= right,
            ComparisonOp::Equal => (left - right).abs() <= COMPARISON_EPSILON,
            ComparisonOp::NotEqual => (left - right).abs() > COMPARISON_EPSILON,
        }
    }

    /// Decode from a wire/gene discriminant.
    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => ComparisonOp::Less,
            1 => ComparisonOp::Greater,
            2 => ComparisonOp::LessOrEqual,
            3 => ComparisonOp::GreaterOrEqual,
            4 => ComparisonOp::Equal,
            5 => ComparisonOp::NotEqual,
            _ => return None,
        })
    }
}

/// Which endpoint a local-variable condition reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionEndpoint {
    /// The synapse's source neuron
    Source,
    /// The synapse's target neuron
    Target,
}

/// Temporal condition operators over the synapse's source-value history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalOp {
    /// Previous value below threshold, current at or above it
    RisingEdge,
    /// Previous value at or above threshold, current below it
    FallingEdge,
    /// Absolute change since the previous value exceeds the threshold
    Changed,
    /// Current value held at or above the threshold for `duration` ticks
    Sustained,
}

/// Combination logic for composite conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeLogic {
    /// Every child must pass
    All,
    /// At least one child must pass
    Any,
}

/// A synapse transmission predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SynapseCondition {
    /// Compare a local variable of one endpoint against a constant
    LocalVar {
        /// Which endpoint's local variables to read
        endpoint: ConditionEndpoint,
        /// Local variable index
        index: usize,
        /// Comparison operator
        op: ComparisonOp,
        /// Right-hand value
        value: f32,
    },
    /// Compare a global hormone against a constant
    GlobalVar {
        /// Hormone index
        index: usize,
        /// Comparison operator
        op: ComparisonOp,
        /// Right-hand value
        value: f32,
    },
    /// Compare the current source value against the target neuron's
    /// total potential
    Relational {
        /// Comparison operator
        op: ComparisonOp,
    },
    /// Edge and persistence tests over the source-value history
    Temporal {
        /// Temporal operator
        op: TemporalOp,
        /// Threshold the history is tested against
        threshold: f32,
        /// Required hold duration (Sustained only)
        duration: u32,
    },
    /// Combine child conditions
    Composite {
        /// Combination logic
        logic: CompositeLogic,
        /// Child conditions; an empty composite evaluates to true
        children: Vec<SynapseCondition>,
    },
}

/// Values the engine assembles for one condition evaluation.
///
/// `sustained_counter` is copied in from the synapse and written back by
/// the caller after evaluation; a Sustained condition mutates it.
#[derive(Debug)]
pub struct ConditionContext<'a> {
    /// Value currently flowing from the source
    pub source_value: f32,
    /// Source value recorded at the previous evaluation
    pub previous_source_value: f32,
    /// Target neuron's dendritic plus soma potential, if the target is
    /// a neuron
    pub target_potential: Option<f32>,
    /// Source neuron's local variables, if the source is a neuron
    pub source_lvars: Option<&'a [f32]>,
    /// Target neuron's local variables, if the target is a neuron
    pub target_lvars: Option<&'a [f32]>,
    /// Global hormone vector
    pub hormones: &'a [f32],
    /// Sustained-hold counter, carried across ticks on the synapse
    pub sustained_counter: u32,
}

impl SynapseCondition {
    /// Evaluate the condition. Defensive: anything unresolvable (bad
    /// index, endpoint of the wrong kind) logs a warning and fails the
    /// test without failing the tick.
    pub fn evaluate(&self, ctx: &mut ConditionContext<'_>) -> bool {
        match self {
            SynapseCondition::LocalVar {
                endpoint,
                index,
                op,
                value,
            } => {
                let lvars = match endpoint {
                    ConditionEndpoint::Source => ctx.source_lvars,
                    ConditionEndpoint::Target => ctx.target_lvars,
                };
                let Some(lvars) = lvars else {
                    log::warn!("LocalVar condition on a non-neuron {endpoint:?} endpoint");
                    return false;
                };
                let Some(&lvar) = lvars.get(*index) else {
                    log::warn!("LocalVar condition index {index} out of range");
                    return false;
                };
                op.apply(lvar, *value)
            }
            SynapseCondition::GlobalVar { index, op, value } => {
                let Some(&hormone) = ctx.hormones.get(*index) else {
                    log::warn!("GlobalVar condition index {index} out of range");
                    return false;
                };
                op.apply(hormone, *value)
            }
            SynapseCondition::Relational { op } => {
                let Some(target_potential) = ctx.target_potential else {
                    log::warn!("Relational condition with a non-neuron target");
                    return false;
                };
                op.apply(ctx.source_value, target_potential)
            }
            SynapseCondition::Temporal {
                op,
                threshold,
                duration,
            } => Self::evaluate_temporal(*op, *threshold, *duration, ctx),
            SynapseCondition::Composite { logic, children } => match logic {
                CompositeLogic::All => children.iter().all(|child| child.evaluate(ctx)),
                CompositeLogic::Any => {
                    if children.is_empty() {
                        true
                    } else {
                        children.iter().any(|child| child.evaluate(ctx))
                    }
                }
            },
        }
    }

    fn evaluate_temporal(
        op: TemporalOp,
        threshold: f32,
        duration: u32,
        ctx: &mut ConditionContext<'_>,
    ) -> bool {
        let current = ctx.source_value;
        let previous = ctx.previous_source_value;
        match op {
            TemporalOp::RisingEdge => previous < threshold && current >= threshold,
            TemporalOp::FallingEdge => previous >= threshold && current < threshold,
            TemporalOp::Changed => (current - previous).abs() > threshold,
            TemporalOp::Sustained => {
                if current >= threshold {
                    ctx.sustained_counter = ctx.sustained_counter.saturating_add(1);
                    ctx.sustained_counter >= duration
                } else {
                    ctx.sustained_counter = 0;
                    false
                }
            }
        }
    }
}
