//! Property tests over the engine's ordering and bounds invariants

use hidra_world::{
    ComparisonOp, Event, EventId, EventPayload, EventQueue, NeuronId, NodeRef,
};
use proptest::prelude::*;

fn arb_event() -> impl Strategy<Value = Event> {
    (any::<u64>(), 0u64..64, any::<bool>(), -100.0f32..100.0).prop_map(
        |(id, tick, pulse, value)| Event {
            id: EventId::new(id),
            execute_at: tick,
            target: NodeRef::Neuron(NeuronId::new(0)),
            payload: if pulse {
                EventPayload::PotentialPulse {
                    value,
                    smoothing: None,
                }
            } else {
                EventPayload::Activate { potential: value }
            },
        },
    )
}

proptest! {
    #[test]
    fn drained_events_are_monotonic_in_tick_then_id(
        events in proptest::collection::vec(arb_event(), 0..64),
        drain_at in 0u64..64,
    ) {
        let mut queue = EventQueue::new();
        for event in events {
            queue.push(event);
        }
        let drained = queue.drain_due(drain_at);

        for partition in [&drained.pulses, &drained.others] {
            let mut last = None;
            for event in partition.iter() {
                prop_assert!(event.execute_at <= drain_at);
                let key = (event.execute_at, event.id);
                if let Some(previous) = last {
                    prop_assert!(key >= previous, "ordering violated: {key:?} after {previous:?}");
                }
                last = Some(key);
            }
        }

        // Everything left in the queue is due later
        for event in queue.to_sorted_vec() {
            prop_assert!(event.execute_at > drain_at);
        }
    }

    #[test]
    fn comparison_ops_are_consistent(a in -1e6f32..1e6, b in -1e6f32..1e6) {
        // Exactly one of <, ==, > holds, up to the epsilon band
        let lt = ComparisonOp::Less.apply(a, b);
        let gt = ComparisonOp::Greater.apply(a, b);
        let eq = ComparisonOp::Equal.apply(a, b);
        prop_assert!(!(lt && gt));
        if eq {
            prop_assert!((a - b).abs() <= 1e-6);
        }
        // Inclusive ops are supersets of their strict forms
        if lt {
            prop_assert!(ComparisonOp::LessOrEqual.apply(a, b));
        }
        if gt {
            prop_assert!(ComparisonOp::GreaterOrEqual.apply(a, b));
        }
        prop_assert_eq!(eq, !ComparisonOp::NotEqual.apply(a, b));
    }
}
