//! Gene bytecode interpreter
//!
//! A stack machine over f32 values. Each instruction costs one unit of
//! fuel; fuel comes from the executing neuron's `GeneExecutionFuel`
//! local variable, or from context defaults for system execution. VM
//! errors are scoped to the single gene: they are logged and surfaced
//! in the [`VmOutcome`], never out of the tick.

use std::sync::Arc;

use hidra_genome::{Instruction, Opcode, Operand, GENE_GENESIS};

use crate::bridge;
use crate::condition::COMPARISON_EPSILON;
use crate::ids::NeuronId;
use crate::logsink::LogLevel;
use crate::neuron::LVAR_GENE_FUEL;
use crate::world::World;

/// Privilege tier a gene executes under.
///
/// Genesis runs as System; Gestation, Mitosis, and Apoptosis run as
/// Protected; every other gene runs as General. API calls declare a
/// required minimum tier; calls below it are refused by the bridge
/// without terminating the gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityContext {
    /// User genes and brain-initiated executions
    General,
    /// Lifecycle genes (Gestation, Mitosis, Apoptosis)
    Protected,
    /// Genesis only
    System,
}

impl SecurityContext {
    /// Context a directly scheduled gene executes under.
    pub fn for_gene(gene_id: usize, system_gene_count: usize) -> Self {
        if gene_id == GENE_GENESIS {
            SecurityContext::System
        } else if gene_id < system_gene_count {
            SecurityContext::Protected
        } else {
            SecurityContext::General
        }
    }

    /// Fuel granted when no executing neuron supplies it.
    pub(crate) fn default_fuel(self) -> f32 {
        match self {
            SecurityContext::System => 5000.0,
            SecurityContext::Protected => 3000.0,
            SecurityContext::General => 1000.0,
        }
    }
}

/// A fault that terminates the running gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VmFault {
    /// An operation needed more stack values than were present
    StackUnderflow {
        /// The faulting opcode
        opcode: Opcode,
    },
}

impl VmFault {
    fn describe(&self) -> String {
        match self {
            VmFault::StackUnderflow { opcode } => {
                format!("stack underflow at {}", opcode.mnemonic())
            }
        }
    }
}

/// Result of one gene execution.
#[derive(Debug, Clone, Default)]
pub struct VmOutcome {
    /// Instructions actually executed
    pub instructions_executed: u64,
    /// Fuel left after execution
    pub fuel_remaining: f32,
    /// Whether execution stopped because fuel ran out
    pub fuel_exhausted: bool,
    /// Fault description, if the gene terminated on an error
    pub error: Option<String>,
}

pub(crate) fn pop(stack: &mut Vec<f32>, opcode: Opcode) -> Result<f32, VmFault> {
    stack.pop().ok_or(VmFault::StackUnderflow { opcode })
}

/// Truncate a stack value to a non-negative index.
pub(crate) fn as_index(value: f32) -> usize {
    if value.is_finite() && value > 0.0 {
        value.trunc() as usize
    } else {
        0
    }
}

/// Execute one gene against the world.
pub(crate) fn run_gene(
    world: &mut World,
    gene_id: usize,
    executing: Option<NeuronId>,
    context: SecurityContext,
) -> VmOutcome {
    let instructions: Arc<[Instruction]> = match world.genome().gene(gene_id) {
        Ok(gene) => Arc::clone(&gene.instructions),
        Err(err) => {
            world.emit("vm", LogLevel::Warning, &format!("refusing execution: {err}"));
            return VmOutcome::default();
        }
    };

    let mut fuel = executing
        .and_then(|id| world.neurons.get(&id).map(|n| n.lvar(LVAR_GENE_FUEL)))
        .unwrap_or_else(|| context.default_fuel());

    let mut outcome = VmOutcome::default();
    let mut stack: Vec<f32> = Vec::with_capacity(16);
    let mut pc = 0usize;

    while pc < instructions.len() {
        if fuel < 1.0 {
            outcome.fuel_exhausted = true;
            world.emit(
                "vm",
                LogLevel::Warning,
                &format!(
                    "gene {gene_id} exhausted its fuel after {} instructions",
                    outcome.instructions_executed
                ),
            );
            break;
        }
        fuel -= 1.0;
        outcome.instructions_executed += 1;

        let instruction = &instructions[pc];
        let mut next_pc = pc + 1;

        let step = execute_instruction(
            world,
            executing,
            context,
            instruction,
            &mut stack,
            &mut next_pc,
            instructions.len(),
        );
        match step {
            Ok(Flow::Continue) => pc = next_pc,
            Ok(Flow::Halt) => break,
            Err(fault) => {
                let message = format!("gene {gene_id}: {}", fault.describe());
                world.emit("vm", LogLevel::Error, &message);
                outcome.error = Some(message);
                break;
            }
        }
    }

    outcome.fuel_remaining = fuel.max(0.0);
    if let Some(id) = executing {
        if let Some(neuron) = world.neurons.get_mut(&id) {
            neuron.store_system_lvar(LVAR_GENE_FUEL, outcome.fuel_remaining);
        }
    }
    outcome
}

enum Flow {
    Continue,
    Halt,
}

fn execute_instruction(
    world: &mut World,
    executing: Option<NeuronId>,
    context: SecurityContext,
    instruction: &Instruction,
    stack: &mut Vec<f32>,
    next_pc: &mut usize,
    program_len: usize,
) -> Result<Flow, VmFault> {
    let opcode = instruction.opcode;
    match opcode {
        Opcode::Nop => {}
        Opcode::PushByte => {
            if let Operand::Byte(b) = instruction.operand {
                stack.push(b as f32);
            }
        }
        Opcode::PushFloat => {
            if let Operand::Float(f) = instruction.operand {
                stack.push(f);
            }
        }
        Opcode::Pop => {
            pop(stack, opcode)?;
        }
        Opcode::Dup => {
            let top = *stack.last().ok_or(VmFault::StackUnderflow { opcode })?;
            stack.push(top);
        }
        Opcode::Swap => {
            let b = pop(stack, opcode)?;
            let a = pop(stack, opcode)?;
            stack.push(b);
            stack.push(a);
        }

        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod
        | Opcode::Min | Opcode::Max => {
            let b = pop(stack, opcode)?;
            let a = pop(stack, opcode)?;
            stack.push(match opcode {
                Opcode::Add => a + b,
                Opcode::Sub => a - b,
                Opcode::Mul => a * b,
                Opcode::Div => {
                    if b == 0.0 {
                        0.0
                    } else {
                        a / b
                    }
                }
                Opcode::Mod => {
                    if b == 0.0 {
                        0.0
                    } else {
                        a % b
                    }
                }
                Opcode::Min => a.min(b),
                _ => a.max(b),
            });
        }
        Opcode::Neg => {
            let a = pop(stack, opcode)?;
            stack.push(-a);
        }
        Opcode::Abs => {
            let a = pop(stack, opcode)?;
            stack.push(a.abs());
        }

        Opcode::CmpEq | Opcode::CmpNe | Opcode::CmpLt | Opcode::CmpGt
        | Opcode::CmpLe | Opcode::CmpGe => {
            let b = pop(stack, opcode)?;
            let a = pop(stack, opcode)?;
            let result = match opcode {
                Opcode::CmpEq => (a - b).abs() <= COMPARISON_EPSILON,
                Opcode::CmpNe => (a - b).abs() > COMPARISON_EPSILON,
                Opcode::CmpLt => a < b,
                Opcode::CmpGt => a > b,
                Opcode::CmpLe => a <= b,
                _ => a >= b,
            };
            stack.push(if result { 1.0 } else { 0.0 });
        }

        Opcode::And | Opcode::Or | Opcode::Xor => {
            let b = pop(stack, opcode)? != 0.0;
            let a = pop(stack, opcode)? != 0.0;
            let result = match opcode {
                Opcode::And => a && b,
                Opcode::Or => a || b,
                _ => a ^ b,
            };
            stack.push(if result { 1.0 } else { 0.0 });
        }
        Opcode::Not => {
            let a = pop(stack, opcode)?;
            stack.push(if a == 0.0 { 1.0 } else { 0.0 });
        }

        Opcode::Jmp | Opcode::Jz | Opcode::Jnz | Opcode::Jne => {
            let taken = match opcode {
                Opcode::Jmp => true,
                Opcode::Jz => pop(stack, opcode)? == 0.0,
                Opcode::Jnz => pop(stack, opcode)? != 0.0,
                _ => {
                    let b = pop(stack, opcode)?;
                    let a = pop(stack, opcode)?;
                    (a - b).abs() > COMPARISON_EPSILON
                }
            };
            if taken {
                match instruction.operand {
                    Operand::Jump { target: Some(t), .. } => {
                        if t >= program_len {
                            return Ok(Flow::Halt);
                        }
                        *next_pc = t;
                    }
                    // Unresolved jump targets execute as no-ops
                    _ => {}
                }
            }
        }
        Opcode::Halt => return Ok(Flow::Halt),

        api if api.is_api_call() => {
            bridge::dispatch(world, executing, context, api, stack)?;
        }

        // from_byte never yields anything outside the arms above
        _ => {}
    }
    Ok(Flow::Continue)
}
