//! Host API bridge between gene code and the world
//!
//! Every `API_*` opcode lands here. The bridge pops the call's operands,
//! checks the caller's security context against the call's required
//! tier, validates arguments, and performs the world operation. Refused
//! or invalid calls push neutral zeros for their declared results and
//! log a warning; they never corrupt state and never terminate the
//! gene. Only stack underflow propagates as a VM fault.

use hidra_genome::Opcode;

use crate::brain::{
    ActivationFn, Brain, BrainInputSource, BrainNodeKind, BrainOutputAction, GateType,
    LogicGateBrain, NetworkBrain, PassThroughBrain,
};
use crate::condition::{ComparisonOp, ConditionEndpoint, SynapseCondition, TemporalOp};
use crate::event::{Event, EventPayload};
use crate::ids::{InputId, NeuronId, NodeRef, OutputId, Vec3};
use crate::logsink::LogLevel;
use crate::synapse::{SignalType, SynapseProperty};
use crate::vm::{as_index, pop, SecurityContext, VmFault};
use crate::world::World;

/// Minimum context an API call requires.
fn required_context(opcode: Opcode) -> SecurityContext {
    match opcode {
        Opcode::ApiCreateNeuron | Opcode::ApiAddSynapse | Opcode::ApiMitosis => {
            SecurityContext::Protected
        }
        _ => SecurityContext::General,
    }
}

/// Number of values the call pushes, used to keep the stack coherent
/// when a call is refused.
fn result_arity(opcode: Opcode) -> usize {
    match opcode {
        Opcode::ApiGetPosition | Opcode::ApiGetNearestNeighborPosition => 3,
        Opcode::ApiGetSelfId
        | Opcode::ApiGetFiringRate
        | Opcode::ApiGetHealth
        | Opcode::ApiGetAge
        | Opcode::ApiGetNeighborCount
        | Opcode::ApiGetNearestNeighborId
        | Opcode::ApiLoadLvar
        | Opcode::ApiLoadGvar
        | Opcode::ApiRandom
        | Opcode::ApiCreateNeuron
        | Opcode::ApiAddSynapse
        | Opcode::ApiMitosis
        | Opcode::ApiAddBrainNode => 1,
        _ => 0,
    }
}

/// Dispatch one API opcode.
pub(crate) fn dispatch(
    world: &mut World,
    executing: Option<NeuronId>,
    context: SecurityContext,
    opcode: Opcode,
    stack: &mut Vec<f32>,
) -> Result<(), VmFault> {
    if context < required_context(opcode) {
        // Operands still come off the stack so execution stays aligned
        let operand_count = operand_arity(opcode);
        for _ in 0..operand_count {
            pop(stack, opcode)?;
        }
        refuse(world, opcode, stack, "insufficient security context");
        return Ok(());
    }

    match opcode {
        Opcode::ApiGetSelfId => {
            let value = executing.map(|id| id.raw() as f32).unwrap_or(-1.0);
            stack.push(value);
        }
        Opcode::ApiGetPosition => match executing.and_then(|id| world.neurons.get(&id)) {
            Some(neuron) => {
                stack.push(neuron.position.x);
                stack.push(neuron.position.y);
                stack.push(neuron.position.z);
            }
            None => refuse(world, opcode, stack, "no executing neuron"),
        },
        Opcode::ApiGetFiringRate => {
            push_neuron_scalar(world, executing, opcode, stack, |n| n.firing_rate());
        }
        Opcode::ApiGetHealth => {
            push_neuron_scalar(world, executing, opcode, stack, |n| n.health());
        }
        Opcode::ApiGetAge => {
            push_neuron_scalar(world, executing, opcode, stack, |n| n.age());
        }

        Opcode::ApiGetNeighborCount => {
            let radius = pop(stack, opcode)?;
            match neighbor_query(world, executing, radius) {
                Some(neighbors) => stack.push(neighbors.len() as f32),
                None => refuse(world, opcode, stack, "no executing neuron"),
            }
        }
        Opcode::ApiGetNearestNeighborId => {
            let radius = pop(stack, opcode)?;
            match nearest_neighbor(world, executing, radius) {
                Some(Some((id, _))) => stack.push(id.raw() as f32),
                Some(None) => stack.push(-1.0),
                None => refuse(world, opcode, stack, "no executing neuron"),
            }
        }
        Opcode::ApiGetNearestNeighborPosition => {
            let radius = pop(stack, opcode)?;
            match nearest_neighbor(world, executing, radius) {
                Some(Some((_, position))) => {
                    stack.push(position.x);
                    stack.push(position.y);
                    stack.push(position.z);
                }
                Some(None) => {
                    stack.push(0.0);
                    stack.push(0.0);
                    stack.push(0.0);
                }
                None => refuse(world, opcode, stack, "no executing neuron"),
            }
        }

        Opcode::ApiLoadLvar => {
            let index = as_index(pop(stack, opcode)?);
            match executing.and_then(|id| world.neurons.get(&id)) {
                Some(neuron) => stack.push(neuron.lvar(index)),
                None => refuse(world, opcode, stack, "no executing neuron"),
            }
        }
        Opcode::ApiStoreLvar => {
            let value = pop(stack, opcode)?;
            let index = as_index(pop(stack, opcode)?);
            let stored = executing
                .and_then(|id| world.neurons.get_mut(&id))
                .map(|neuron| neuron.store_user_lvar(index, value));
            match stored {
                Some(true) => {}
                Some(false) => {
                    refuse(world, opcode, stack, &format!("lvar {index} is not writable"))
                }
                None => refuse(world, opcode, stack, "no executing neuron"),
            }
        }
        Opcode::ApiLoadGvar => {
            let index = as_index(pop(stack, opcode)?);
            let value = world.hormones.get(index).copied();
            match value {
                Some(v) => stack.push(v),
                None => refuse(world, opcode, stack, &format!("hormone {index} out of range")),
            }
        }
        Opcode::ApiStoreGvar => {
            let value = pop(stack, opcode)?;
            let index = as_index(pop(stack, opcode)?);
            if index < world.hormones.len() {
                world.hormones[index] = value;
            } else {
                refuse(world, opcode, stack, &format!("hormone {index} out of range"));
            }
        }
        Opcode::ApiRandom => {
            let value = world.rng.next_float_unit();
            stack.push(value);
        }

        Opcode::ApiCreateNeuron => {
            let z = pop(stack, opcode)?;
            let y = pop(stack, opcode)?;
            let x = pop(stack, opcode)?;
            let id = world.add_neuron_buffered(Vec3::new(x, y, z));
            stack.push(id.raw() as f32);
        }
        Opcode::ApiAddSynapse => {
            let weight = pop(stack, opcode)?;
            let signal_raw = pop(stack, opcode)?;
            let target_id = pop(stack, opcode)?;
            let target_kind = pop(stack, opcode)?;
            let source_id = pop(stack, opcode)?;
            let source_kind = pop(stack, opcode)?;

            let signal_type = SignalType::from_index(as_index(signal_raw) as u8);
            let source = node_ref(source_kind, source_id);
            let target = node_ref(target_kind, target_id);
            match (signal_type, source, target) {
                (Some(signal_type), Some(source), Some(target)) => {
                    match world.add_synapse(source, target, signal_type, weight) {
                        Ok(id) => stack.push(id.raw() as f32),
                        Err(err) => refuse(world, opcode, stack, &err.to_string()),
                    }
                }
                _ => refuse(world, opcode, stack, "malformed endpoint or signal type"),
            }
        }
        Opcode::ApiMitosis => {
            let dz = pop(stack, opcode)?;
            let dy = pop(stack, opcode)?;
            let dx = pop(stack, opcode)?;
            match executing {
                Some(parent) => {
                    match world.perform_mitosis_buffered(parent, Vec3::new(dx, dy, dz)) {
                        Ok(child) => stack.push(child.raw() as f32),
                        Err(err) => refuse(world, opcode, stack, &err.to_string()),
                    }
                }
                None => refuse(world, opcode, stack, "no executing neuron"),
            }
        }
        Opcode::ApiMarkForDeath => {
            let marked = executing
                .and_then(|id| world.neurons.get_mut(&id))
                .map(|neuron| neuron.marked_for_death = true);
            if marked.is_none() {
                refuse(world, opcode, stack, "no executing neuron");
            }
        }
        Opcode::ApiScheduleGene => {
            let delay = pop(stack, opcode)?;
            let gene_raw = pop(stack, opcode)?;
            let gene_id = as_index(gene_raw);
            match executing {
                Some(target) if gene_id < world.genome.gene_count() => {
                    let execute_at = world.current_tick + 1 + as_index(delay) as u64;
                    let event = Event {
                        id: world.alloc_event_id(),
                        execute_at,
                        target: NodeRef::Neuron(target),
                        payload: EventPayload::ExecuteGene { gene_id },
                    };
                    world.next_tick_events.push(event);
                }
                Some(_) => refuse(world, opcode, stack, &format!("gene {gene_id} out of range")),
                None => refuse(world, opcode, stack, "no executing neuron"),
            }
        }

        Opcode::ApiSetSynapseCondition => {
            let duration = pop(stack, opcode)?;
            let threshold = pop(stack, opcode)?;
            let op_raw = pop(stack, opcode)?;
            let var_index = pop(stack, opcode)?;
            let kind = pop(stack, opcode)?;
            let syn_index = pop(stack, opcode)?;

            let condition = build_condition(
                as_index(kind) as u8,
                as_index(var_index),
                as_index(op_raw) as u8,
                threshold,
                as_index(duration) as u32,
            );
            match condition {
                Some(condition) => {
                    with_owned_synapse(world, executing, opcode, as_index(syn_index), |synapse| {
                        synapse.condition = Some(condition);
                    });
                }
                None => refuse(world, opcode, stack, "unrecognized condition kind or operator"),
            }
        }
        Opcode::ApiSetSynapseProperty => {
            let value = pop(stack, opcode)?;
            let property_raw = pop(stack, opcode)?;
            let syn_index = pop(stack, opcode)?;
            match SynapseProperty::from_index(as_index(property_raw) as u8) {
                Some(property) => {
                    with_owned_synapse(world, executing, opcode, as_index(syn_index), |synapse| {
                        synapse.set_property(property, value);
                    });
                }
                None => refuse(world, opcode, stack, "unrecognized synapse property"),
            }
        }

        Opcode::ApiSetBrainType => {
            let type_raw = pop(stack, opcode)?;
            let brain = match as_index(type_raw) {
                0 => Some(Brain::PassThrough(PassThroughBrain)),
                1 => Some(Brain::LogicGate(LogicGateBrain::new(GateType::And, 0.5))),
                2 => Some(Brain::LogicGate(LogicGateBrain::new(GateType::Or, 0.5))),
                3 => Some(Brain::LogicGate(LogicGateBrain::new(GateType::Nand, 0.5))),
                4 => Some(Brain::LogicGate(LogicGateBrain::new(GateType::Nor, 0.5))),
                5 => Some(Brain::LogicGate(LogicGateBrain::new(GateType::Xor, 0.5))),
                6 => Some(Brain::Network(NetworkBrain::new())),
                _ => None,
            };
            let applied: std::result::Result<(), &str> = match brain {
                Some(brain) => match executing.and_then(|id| world.neurons.get_mut(&id)) {
                    Some(neuron) => {
                        neuron.brain = brain;
                        Ok(())
                    }
                    None => Err("no executing neuron"),
                },
                None => Err("unrecognized brain type"),
            };
            if let Err(reason) = applied {
                refuse(world, opcode, stack, reason);
            }
        }
        Opcode::ApiAddBrainNode => {
            let bias = pop(stack, opcode)?;
            let activation_raw = pop(stack, opcode)?;
            let selector_value = pop(stack, opcode)?;
            let selector = pop(stack, opcode)?;
            let kind_raw = pop(stack, opcode)?;

            let kind = match as_index(kind_raw) {
                0 => Some(BrainNodeKind::Input),
                1 => Some(BrainNodeKind::Hidden),
                2 => Some(BrainNodeKind::Output),
                _ => None,
            };
            let activation = match as_index(activation_raw) {
                0 => Some(ActivationFn::Tanh),
                1 => Some(ActivationFn::Relu),
                2 => Some(ActivationFn::Sigmoid),
                3 => Some(ActivationFn::Identity),
                _ => None,
            };

            let (source, action) = match kind {
                Some(BrainNodeKind::Input) => {
                    (input_source(as_index(selector) as u8, selector_value), None)
                }
                Some(BrainNodeKind::Output) => {
                    (None, output_action(as_index(selector) as u8))
                }
                _ => (None, None),
            };

            let node_id = match (kind, activation, executing.and_then(|id| world.neurons.get_mut(&id))) {
                (Some(kind), Some(activation), Some(neuron)) => {
                    if let Brain::Network(net) = &mut neuron.brain {
                        Some(net.add_node(kind, bias, activation, source, action))
                    } else {
                        None
                    }
                }
                _ => None,
            };
            match node_id {
                Some(id) => stack.push(id as f32),
                None => refuse(world, opcode, stack, "brain node rejected"),
            }
        }
        Opcode::ApiAddBrainConnection => {
            let weight = pop(stack, opcode)?;
            let to = as_index(pop(stack, opcode)?) as u32;
            let from = as_index(pop(stack, opcode)?) as u32;
            let result = match executing.and_then(|id| world.neurons.get_mut(&id)) {
                Some(neuron) => match &mut neuron.brain {
                    Brain::Network(net) => Some(net.add_connection(from, to, weight)),
                    _ => None,
                },
                None => None,
            };
            match result {
                Some(Ok(())) => {}
                Some(Err(err)) => refuse(world, opcode, stack, &err.to_string()),
                None => refuse(world, opcode, stack, "no network brain on executing neuron"),
            }
        }

        other => {
            // Non-API opcodes never reach the bridge
            world.emit(
                "bridge",
                LogLevel::Warning,
                &format!("non-API opcode {} dispatched to bridge", other.mnemonic()),
            );
        }
    }
    Ok(())
}

/// Operand count for pre-popping refused calls.
fn operand_arity(opcode: Opcode) -> usize {
    match opcode {
        Opcode::ApiGetNeighborCount
        | Opcode::ApiGetNearestNeighborId
        | Opcode::ApiGetNearestNeighborPosition
        | Opcode::ApiLoadLvar
        | Opcode::ApiLoadGvar
        | Opcode::ApiSetBrainType => 1,
        Opcode::ApiStoreLvar | Opcode::ApiStoreGvar | Opcode::ApiScheduleGene => 2,
        Opcode::ApiCreateNeuron
        | Opcode::ApiMitosis
        | Opcode::ApiSetSynapseProperty
        | Opcode::ApiAddBrainConnection => 3,
        Opcode::ApiAddBrainNode => 5,
        Opcode::ApiAddSynapse | Opcode::ApiSetSynapseCondition => 6,
        _ => 0,
    }
}

/// Log a refusal and push neutral results for the call.
fn refuse(world: &World, opcode: Opcode, stack: &mut Vec<f32>, reason: &str) {
    world.emit(
        "bridge",
        LogLevel::Warning,
        &format!("{} refused: {reason}", opcode.mnemonic()),
    );
    for _ in 0..result_arity(opcode) {
        stack.push(0.0);
    }
}

fn push_neuron_scalar(
    world: &mut World,
    executing: Option<NeuronId>,
    opcode: Opcode,
    stack: &mut Vec<f32>,
    read: impl Fn(&crate::neuron::Neuron) -> f32,
) {
    match executing.and_then(|id| world.neurons.get(&id)) {
        Some(neuron) => stack.push(read(neuron)),
        None => refuse(world, opcode, stack, "no executing neuron"),
    }
}

/// Neighbor list around the executing neuron, None without one.
fn neighbor_query(
    world: &mut World,
    executing: Option<NeuronId>,
    radius: f32,
) -> Option<Vec<(NeuronId, Vec3)>> {
    let id = executing?;
    let position = world.neurons.get(&id)?.position;
    if world.caches_dirty {
        world.rebuild_caches();
    }
    Some(world.spatial.find_neighbors(&position, radius, Some(id)))
}

/// Nearest neighbor by distance with id tiebreak. Outer None means no
/// executing neuron; inner None means no neighbor in range.
#[allow(clippy::type_complexity)]
fn nearest_neighbor(
    world: &mut World,
    executing: Option<NeuronId>,
    radius: f32,
) -> Option<Option<(NeuronId, Vec3)>> {
    let id = executing?;
    let position = world.neurons.get(&id)?.position;
    let neighbors = neighbor_query(world, executing, radius)?;
    Some(
        neighbors
            .into_iter()
            .map(|(nid, npos)| (nid, npos, npos.distance_squared(&position)))
            .min_by(|a, b| {
                a.2.partial_cmp(&b.2)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            })
            .map(|(nid, npos, _)| (nid, npos)),
    )
}

fn node_ref(kind: f32, id: f32) -> Option<NodeRef> {
    let raw = id.max(0.0).trunc() as u64;
    Some(match as_index(kind) {
        0 => NodeRef::Neuron(NeuronId::new(raw)),
        1 => NodeRef::Input(InputId::new(raw)),
        2 => NodeRef::Output(OutputId::new(raw)),
        _ => return None,
    })
}

fn input_source(selector: u8, value: f32) -> Option<BrainInputSource> {
    Some(match selector {
        0 => BrainInputSource::ActivationPotential,
        1 => BrainInputSource::TotalPotential,
        2 => BrainInputSource::Health,
        3 => BrainInputSource::Age,
        4 => BrainInputSource::FiringRate,
        5 => BrainInputSource::LocalVar(as_index(value)),
        6 => BrainInputSource::Hormone(as_index(value)),
        7 => BrainInputSource::IncomingSynapse(as_index(value)),
        8 => BrainInputSource::Constant(value),
        _ => return None,
    })
}

fn output_action(selector: u8) -> Option<BrainOutputAction> {
    Some(match selector {
        0 => BrainOutputAction::SetOutput,
        1 => BrainOutputAction::ExecuteGene,
        2 => BrainOutputAction::MoveX,
        3 => BrainOutputAction::MoveY,
        4 => BrainOutputAction::MoveZ,
        _ => return None,
    })
}

fn build_condition(
    kind: u8,
    var_index: usize,
    op_raw: u8,
    threshold: f32,
    duration: u32,
) -> Option<SynapseCondition> {
    Some(match kind {
        0 | 1 => SynapseCondition::LocalVar {
            endpoint: if kind == 0 {
                ConditionEndpoint::Source
            } else {
                ConditionEndpoint::Target
            },
            index: var_index,
            op: ComparisonOp::from_index(op_raw)?,
            value: threshold,
        },
        2 => SynapseCondition::GlobalVar {
            index: var_index,
            op: ComparisonOp::from_index(op_raw)?,
            value: threshold,
        },
        3 => SynapseCondition::Relational {
            op: ComparisonOp::from_index(op_raw)?,
        },
        4 | 5 | 6 | 7 => SynapseCondition::Temporal {
            op: match kind {
                4 => TemporalOp::RisingEdge,
                5 => TemporalOp::FallingEdge,
                6 => TemporalOp::Changed,
                _ => TemporalOp::Sustained,
            },
            threshold,
            duration,
        },
        _ => return None,
    })
}

/// Apply a mutation to the executing neuron's owned synapse at
/// `syn_index`, warning on any failure.
fn with_owned_synapse(
    world: &mut World,
    executing: Option<NeuronId>,
    opcode: Opcode,
    syn_index: usize,
    mutate: impl FnOnce(&mut crate::synapse::Synapse),
) {
    let synapse_id = executing
        .and_then(|id| world.neurons.get(&id))
        .and_then(|neuron| neuron.owned_synapses.get(syn_index).copied())
        .filter(|sid| world.synapses.contains_key(sid));
    match synapse_id {
        Some(sid) => {
            if let Some(synapse) = world.synapses.get_mut(&sid) {
                mutate(synapse);
            }
        }
        None => {
            world.emit(
                "bridge",
                LogLevel::Warning,
                &format!("{} refused: owned synapse {syn_index} not found", opcode.mnemonic()),
            );
        }
    }
}
