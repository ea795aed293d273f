//! Reproducibility guarantees: identical seeds give identical worlds,
//! and save/restore is invisible to the future of the run.

use std::collections::BTreeMap;

use hidra_genome::{GeneBuilder, GenomeBuilder, Opcode};
use hidra_world::{World, WorldConfig, WorldSnapshot};

/// A genome with real activity: Genesis creates three neurons, wires
/// them into a chain from input 100, stores a random draw into hormone
/// 0, and the Gestation gene stamps a local variable.
fn active_genome() -> Vec<u8> {
    let genesis = GeneBuilder::new()
        // Three neurons along the x axis
        .push_byte(0)
        .push_byte(0)
        .push_byte(0)
        .op(Opcode::ApiCreateNeuron)
        .op(Opcode::Pop)
        .push_byte(2)
        .push_byte(0)
        .push_byte(0)
        .op(Opcode::ApiCreateNeuron)
        .op(Opcode::Pop)
        .push_byte(4)
        .push_byte(0)
        .push_byte(0)
        .op(Opcode::ApiCreateNeuron)
        .op(Opcode::Pop)
        // input 100 -> neuron 1, Immediate, weight 1
        .push_byte(1) // source kind: input
        .push_byte(100) // source id
        .push_byte(0) // target kind: neuron
        .push_byte(1) // target id
        .push_byte(0) // signal type: immediate
        .push_float(1.0) // weight
        .op(Opcode::ApiAddSynapse)
        .op(Opcode::Pop)
        // neuron 1 -> neuron 2, Immediate, weight 0.9
        .push_byte(0)
        .push_byte(1)
        .push_byte(0)
        .push_byte(2)
        .push_byte(0)
        .push_float(0.9)
        .op(Opcode::ApiAddSynapse)
        .op(Opcode::Pop)
        // neuron 2 -> neuron 3, Delayed, weight 0.8
        .push_byte(0)
        .push_byte(2)
        .push_byte(0)
        .push_byte(3)
        .push_byte(1)
        .push_float(0.8)
        .op(Opcode::ApiAddSynapse)
        .op(Opcode::Pop)
        // hormone 0 := random unit draw
        .push_byte(0)
        .op(Opcode::ApiRandom)
        .op(Opcode::ApiStoreGvar)
        .op(Opcode::Halt)
        .finish()
        .unwrap();

    let gestation = GeneBuilder::new()
        // lvar 10 := 7
        .push_byte(10)
        .push_byte(7)
        .op(Opcode::ApiStoreLvar)
        .op(Opcode::Halt)
        .finish()
        .unwrap();

    GenomeBuilder::new()
        .gene(genesis)
        .gene(gestation)
        .empty_gene()
        .empty_gene()
        .finish()
}

fn seeded_config() -> WorldConfig {
    WorldConfig {
        seed0: 42,
        seed1: 43,
        ..WorldConfig::default()
    }
}

fn drive(world: &mut World, ticks: u64) {
    let mut values = BTreeMap::new();
    for _ in 0..ticks {
        // A repeating input pattern that crosses the firing threshold
        // every third tick
        let phase = world.current_tick() % 3;
        values.insert(100u64, if phase == 0 { 1.5 } else { 0.25 });
        world.apply_inputs_and_step(&values).unwrap();
    }
}

#[test]
fn identical_seeds_give_bit_identical_runs() {
    let mut a = World::new(seeded_config(), &active_genome(), &[100], &[200]).unwrap();
    let mut b = World::new(seeded_config(), &active_genome(), &[100], &[200]).unwrap();

    for round in 0..40u64 {
        let bytes_a = a.snapshot().to_bytes().unwrap();
        let bytes_b = b.snapshot().to_bytes().unwrap();
        assert_eq!(bytes_a, bytes_b, "divergence before round {round}");
        drive(&mut a, 1);
        drive(&mut b, 1);
    }
}

#[test]
fn restore_matches_continued_run() {
    let mut original = World::new(seeded_config(), &active_genome(), &[100], &[200]).unwrap();
    drive(&mut original, 100);

    let snapshot_bytes = original.snapshot().to_bytes().unwrap();

    // (a) continue the original
    drive(&mut original, 50);

    // (b) restore and run the same continuation
    let snapshot = WorldSnapshot::from_bytes(&snapshot_bytes).unwrap();
    let mut restored = World::restore(snapshot).unwrap();
    drive(&mut restored, 50);

    assert_eq!(
        original.snapshot().to_bytes().unwrap(),
        restored.snapshot().to_bytes().unwrap()
    );
}

#[test]
fn restored_world_produces_same_identifiers() {
    let mut original = World::new(seeded_config(), &active_genome(), &[100], &[200]).unwrap();
    drive(&mut original, 10);

    let mut restored = World::restore(original.snapshot()).unwrap();

    let a = original.add_neuron(hidra_world::Vec3::ZERO);
    let b = restored.add_neuron(hidra_world::Vec3::ZERO);
    assert_eq!(a, b);
}

#[test]
fn different_seeds_diverge() {
    let mut a = World::new(seeded_config(), &active_genome(), &[100], &[200]).unwrap();
    let alt = WorldConfig {
        seed0: 7,
        seed1: 9,
        ..seeded_config()
    };
    let mut b = World::new(alt, &active_genome(), &[100], &[200]).unwrap();

    drive(&mut a, 1);
    drive(&mut b, 1);

    // Genesis drew a random hormone value, so the hormone vectors differ
    assert_ne!(a.hormones()[0], b.hormones()[0]);
}

#[test]
fn fatigue_stays_bounded_across_a_long_run() {
    let mut world = World::new(seeded_config(), &active_genome(), &[100], &[200]).unwrap();
    // Give every synapse a real fatigue response
    for synapse in world.synapses() {
        world
            .set_synapse_property(synapse.id, hidra_world::SynapseProperty::FatigueRate, 0.3)
            .unwrap();
        world
            .set_synapse_property(
                synapse.id,
                hidra_world::SynapseProperty::FatigueRecoveryRate,
                0.05,
            )
            .unwrap();
    }
    drive(&mut world, 200);
    for synapse in world.synapses() {
        assert!(
            (0.0..=1.0).contains(&synapse.fatigue),
            "fatigue out of bounds on {}",
            synapse.id
        );
    }
}

#[test]
fn local_variable_length_is_invariant() {
    let mut world = World::new(seeded_config(), &active_genome(), &[100], &[200]).unwrap();
    drive(&mut world, 50);
    for neuron in world.neurons() {
        assert_eq!(neuron.lvars().len(), 256);
    }
}

#[test]
fn gestation_ran_on_created_neurons() {
    let mut world = World::new(seeded_config(), &active_genome(), &[100], &[200]).unwrap();
    world.step().unwrap();
    // The Gestation gene stamped lvar 10 on every Genesis-created neuron
    for neuron in world.neurons() {
        assert_eq!(neuron.lvar(10), 7.0, "neuron {}", neuron.id);
    }
}
