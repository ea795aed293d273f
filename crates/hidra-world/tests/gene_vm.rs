//! Gene VM behavior through the public world surface: security
//! contexts, host-call validation, and error scoping.

use hidra_genome::{GeneBuilder, GenomeBuilder, Opcode};
use hidra_world::{NeuronId, World, WorldConfig};

fn minimal_genesis() -> Vec<u8> {
    GeneBuilder::new().op(Opcode::Halt).finish().unwrap()
}

fn world_with_user_gene(user_gene: Vec<u8>) -> World {
    let genome = GenomeBuilder::new()
        .gene(minimal_genesis())
        .empty_gene()
        .empty_gene()
        .empty_gene()
        .gene(user_gene)
        .finish();
    World::new(WorldConfig::default(), &genome, &[100], &[200]).unwrap()
}

#[test]
fn general_context_cannot_create_neurons() {
    // Gene 4 (General) tries to create a neuron; the bridge refuses and
    // pushes the neutral id 0, which the gene stores to lvar 20
    let gene = GeneBuilder::new()
        .push_byte(20) // lvar index for the result
        .push_byte(9)
        .push_byte(9)
        .push_byte(9)
        .op(Opcode::ApiCreateNeuron)
        .op(Opcode::ApiStoreLvar)
        .op(Opcode::Halt)
        .finish()
        .unwrap();
    let mut world = world_with_user_gene(gene);
    let neuron = NeuronId::new(1);

    // Sentinel so the neutral result is observable
    world.set_local_variable(neuron, 20, -1.0).unwrap();
    world.schedule_gene(neuron, 4, 0).unwrap();
    world.step().unwrap();

    // Refused: no new neuron, neutral 0 captured
    assert_eq!(world.neurons().len(), 1);
    assert_eq!(world.neuron(neuron).unwrap().lvar(20), 0.0);
}

#[test]
fn stack_underflow_terminates_gene_without_halting_world() {
    let gene = GeneBuilder::new()
        .op(Opcode::Add) // underflow immediately
        .push_byte(20)
        .push_byte(1)
        .op(Opcode::ApiStoreLvar) // never reached
        .op(Opcode::Halt)
        .finish()
        .unwrap();
    let mut world = world_with_user_gene(gene);
    let neuron = NeuronId::new(1);

    world.schedule_gene(neuron, 4, 0).unwrap();
    world.step().unwrap();

    assert!(!world.is_halted());
    assert_eq!(world.neuron(neuron).unwrap().lvar(20), 0.0);
    // The world keeps stepping normally
    world.step().unwrap();
}

#[test]
fn arithmetic_and_store_roundtrip() {
    // lvar 30 := (3 + 4) * 2
    let gene = GeneBuilder::new()
        .push_byte(30)
        .push_byte(3)
        .push_byte(4)
        .op(Opcode::Add)
        .push_byte(2)
        .op(Opcode::Mul)
        .op(Opcode::ApiStoreLvar)
        .op(Opcode::Halt)
        .finish()
        .unwrap();
    let mut world = world_with_user_gene(gene);
    let neuron = NeuronId::new(1);

    world.schedule_gene(neuron, 4, 0).unwrap();
    world.step().unwrap();
    assert_eq!(world.neuron(neuron).unwrap().lvar(30), 14.0);
}

#[test]
fn conditional_jump_skips_store() {
    // Push 0, JZ over the store; lvar 40 stays 0
    let gene = GeneBuilder::new()
        .push_byte(0)
        .jump(Opcode::Jz, "end")
        .push_byte(40)
        .push_byte(9)
        .op(Opcode::ApiStoreLvar)
        .label("end")
        .op(Opcode::Halt)
        .finish()
        .unwrap();
    let mut world = world_with_user_gene(gene);
    let neuron = NeuronId::new(1);

    world.schedule_gene(neuron, 4, 0).unwrap();
    world.step().unwrap();
    assert_eq!(world.neuron(neuron).unwrap().lvar(40), 0.0);
}

#[test]
fn backward_jump_loops_until_fuel_bound() {
    // An infinite loop; only the fuel bound stops it
    let gene = GeneBuilder::new()
        .label("top")
        .jump(Opcode::Jmp, "top")
        .finish()
        .unwrap();
    let mut world = world_with_user_gene(gene);
    let neuron = NeuronId::new(1);

    world.set_local_variable(neuron, 5, 123.0).unwrap();
    world.schedule_gene(neuron, 4, 0).unwrap();
    world.step().unwrap();

    assert_eq!(world.neuron(neuron).unwrap().lvar(5), 0.0);
    assert!(!world.is_halted());
}

#[test]
fn system_lvar_store_is_refused() {
    // Attempt to overwrite health (lvar 243) from gene code
    let gene = GeneBuilder::new()
        .push_float(243.0)
        .push_float(9999.0)
        .op(Opcode::ApiStoreLvar)
        .op(Opcode::Halt)
        .finish()
        .unwrap();
    let mut world = world_with_user_gene(gene);
    let neuron = NeuronId::new(1);
    let health_before = world.neuron(neuron).unwrap().health();

    world.schedule_gene(neuron, 4, 0).unwrap();
    world.step().unwrap();

    // Health only changed by the tick's metabolic tax
    let expected = health_before - world.config().metabolic_tax_per_tick;
    assert_eq!(world.neuron(neuron).unwrap().health(), expected);
}

#[test]
fn hormones_readable_and_writable_from_genes() {
    // hormone 3 := hormone 3 + 2.5, run twice
    let gene = GeneBuilder::new()
        .push_byte(3)
        .push_byte(3)
        .op(Opcode::ApiLoadGvar)
        .push_float(2.5)
        .op(Opcode::Add)
        .op(Opcode::ApiStoreGvar)
        .op(Opcode::Halt)
        .finish()
        .unwrap();
    let mut world = world_with_user_gene(gene);
    let neuron = NeuronId::new(1);

    world.schedule_gene(neuron, 4, 0).unwrap();
    world.step().unwrap();
    world.schedule_gene(neuron, 4, 0).unwrap();
    world.step().unwrap();

    assert_eq!(world.hormones()[3], 5.0);
}

#[test]
fn gene_can_grow_a_brain() {
    // Replace the brain with a network, add an input node reading the
    // activation potential and an output node driving SetOutput, and
    // connect them
    let gene = GeneBuilder::new()
        // node 0: input, source = activation potential
        .push_byte(0) // kind: input
        .push_byte(0) // selector: activation potential
        .push_byte(0) // selector value
        .push_byte(3) // activation: identity
        .push_byte(0) // bias
        .op(Opcode::ApiAddBrainNode)
        .op(Opcode::Pop)
        // node 1: output, action = set output
        .push_byte(2) // kind: output
        .push_byte(0) // selector: set output
        .push_byte(0)
        .push_byte(3)
        .push_byte(0)
        .op(Opcode::ApiAddBrainNode)
        .op(Opcode::Pop)
        // connect 0 -> 1 with weight 1
        .push_byte(0)
        .push_byte(1)
        .push_float(1.0)
        .op(Opcode::ApiAddBrainConnection)
        .op(Opcode::Halt)
        .finish()
        .unwrap();

    // Prepend the brain-type switch so the gene runs against a network
    let switch = GeneBuilder::new()
        .push_byte(6)
        .op(Opcode::ApiSetBrainType)
        .op(Opcode::Halt)
        .finish()
        .unwrap();

    let genome = GenomeBuilder::new()
        .gene(minimal_genesis())
        .empty_gene()
        .empty_gene()
        .empty_gene()
        .gene(switch)
        .gene(gene)
        .finish();
    let mut world = World::new(WorldConfig::default(), &genome, &[100], &[200]).unwrap();
    let neuron = NeuronId::new(1);

    world.schedule_gene(neuron, 4, 0).unwrap();
    world.step().unwrap();
    world.schedule_gene(neuron, 5, 0).unwrap();
    world.step().unwrap();

    let brain = world.neuron(neuron).unwrap().brain;
    match brain {
        hidra_world::Brain::Network(net) => {
            assert_eq!(net.nodes.len(), 2);
            assert_eq!(net.connections.len(), 1);
        }
        other => panic!("expected a network brain, got {other:?}"),
    }
}

#[test]
fn missing_gene_execution_is_a_noop() {
    let mut world = world_with_user_gene(minimal_genesis());
    let neuron = NeuronId::new(1);
    // Gene 99 does not exist; scheduling is refused up front
    assert!(world.schedule_gene(neuron, 99, 0).is_err());
    // Stepping is unaffected
    world.step().unwrap();
    assert!(!world.is_halted());
}
