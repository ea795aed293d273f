//! Scheduled events and the tick-keyed priority queue

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::ids::{EventId, NodeRef};

/// Payload of a scheduled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// A neuron crossed its effective threshold; carries the total
    /// potential at threshold crossing
    Activate {
        /// Dendritic plus soma potential at the crossing
        potential: f32,
    },
    /// Run a gene on the target entity
    ExecuteGene {
        /// Gene id within the genome
        gene_id: usize,
    },
    /// Run a gene queued by a brain output on its own neuron
    ExecuteGeneFromBrain {
        /// Gene id within the genome
        gene_id: usize,
    },
    /// Deliver a potential pulse to the target
    PotentialPulse {
        /// Transmitted value
        value: f32,
        /// Output smoothing factor for Immediate-sourced pulses; None
        /// for pulses that add directly
        smoothing: Option<f32>,
    },
}

/// One scheduled event.
///
/// Events are totally ordered by `(execute_at, id)` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event id, monotonic per world
    pub id: EventId,
    /// Tick at which the event becomes due
    pub execute_at: u64,
    /// Entity the event acts on
    pub target: NodeRef,
    /// What to do
    pub payload: EventPayload,
}

impl Event {
    /// Whether this is a potential pulse.
    pub fn is_pulse(&self) -> bool {
        matches!(self.payload, EventPayload::PotentialPulse { .. })
    }
}

/// Heap entry ordered by `(execute_at, id)`, inverted for a min-heap.
#[derive(Debug, Clone)]
struct QueuedEvent(Event);

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.0.execute_at == other.0.execute_at && self.0.id == other.0.id
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the smallest key first
        (other.0.execute_at, other.0.id).cmp(&(self.0.execute_at, self.0.id))
    }
}

/// Events drained for one tick, partitioned by kind.
#[derive(Debug, Default, Clone)]
pub struct DrainedEvents {
    /// PotentialPulse events, in `(execute_at, id)` order
    pub pulses: Vec<Event>,
    /// All other events, in `(execute_at, id)` order
    pub others: Vec<Event>,
}

/// Min-priority queue of scheduled events keyed by `(execute_at, id)`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Event>", into = "Vec<Event>")]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Schedule an event.
    pub fn push(&mut self, event: Event) {
        self.heap.push(QueuedEvent(event));
    }

    /// Remove and return every event with `execute_at <= current_tick`,
    /// partitioned into pulses and others, each in `(execute_at, id)`
    /// order.
    pub fn drain_due(&mut self, current_tick: u64) -> DrainedEvents {
        let mut drained = DrainedEvents::default();
        while let Some(entry) = self.heap.peek() {
            if entry.0.execute_at > current_tick {
                break;
            }
            let Some(entry) = self.heap.pop() else { break };
            let event = entry.0;
            if event.is_pulse() {
                drained.pulses.push(event);
            } else {
                drained.others.push(event);
            }
        }
        drained
    }

    /// Diagnostic: clone every queued event due exactly at `tick`, in
    /// arbitrary order.
    pub fn peek_for_tick(&self, tick: u64) -> Vec<Event> {
        self.heap
            .iter()
            .filter(|e| e.0.execute_at == tick)
            .map(|e| e.0.clone())
            .collect()
    }

    /// Snapshot the queue contents in `(execute_at, id)` order.
    pub fn to_sorted_vec(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self.heap.iter().map(|e| e.0.clone()).collect();
        events.sort_by_key(|e| (e.execute_at, e.id));
        events
    }
}

impl From<Vec<Event>> for EventQueue {
    fn from(events: Vec<Event>) -> Self {
        let mut queue = EventQueue::new();
        for event in events {
            queue.push(event);
        }
        queue
    }
}

impl From<EventQueue> for Vec<Event> {
    fn from(queue: EventQueue) -> Self {
        queue.to_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NeuronId;

    fn event(id: u64, tick: u64) -> Event {
        Event {
            id: EventId::new(id),
            execute_at: tick,
            target: NodeRef::Neuron(NeuronId::new(0)),
            payload: EventPayload::Activate { potential: 1.0 },
        }
    }

    fn pulse(id: u64, tick: u64, value: f32) -> Event {
        Event {
            id: EventId::new(id),
            execute_at: tick,
            target: NodeRef::Neuron(NeuronId::new(0)),
            payload: EventPayload::PotentialPulse {
                value,
                smoothing: None,
            },
        }
    }

    #[test]
    fn test_drain_order_is_tick_then_id() {
        let mut queue = EventQueue::new();
        queue.push(event(5, 2));
        queue.push(event(1, 3));
        queue.push(event(3, 2));
        queue.push(event(2, 1));

        let drained = queue.drain_due(2);
        let keys: Vec<(u64, u64)> = drained
            .others
            .iter()
            .map(|e| (e.execute_at, e.id.raw()))
            .collect();
        assert_eq!(keys, vec![(1, 2), (2, 3), (2, 5)]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_partitions_pulses() {
        let mut queue = EventQueue::new();
        queue.push(event(1, 0));
        queue.push(pulse(2, 0, 1.5));
        queue.push(pulse(3, 0, -0.5));

        let drained = queue.drain_due(0);
        assert_eq!(drained.pulses.len(), 2);
        assert_eq!(drained.others.len(), 1);
    }

    #[test]
    fn test_future_events_stay_queued() {
        let mut queue = EventQueue::new();
        queue.push(event(1, 10));
        let drained = queue.drain_due(5);
        assert!(drained.others.is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_peek_for_tick() {
        let mut queue = EventQueue::new();
        queue.push(event(1, 4));
        queue.push(event(2, 4));
        queue.push(event(3, 5));
        assert_eq!(queue.peek_for_tick(4).len(), 2);
        assert_eq!(queue.peek_for_tick(6).len(), 0);
        // Peeking never consumes
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_serde_preserves_contents() {
        let mut queue = EventQueue::new();
        queue.push(event(3, 7));
        queue.push(pulse(1, 2, 0.25));
        let bytes = bincode::serialize(&queue).unwrap();
        let mut restored: EventQueue = bincode::deserialize(&bytes).unwrap();

        let a = queue.drain_due(100);
        let b = restored.drain_due(100);
        assert_eq!(a.pulses, b.pulses);
        assert_eq!(a.others, b.others);
    }
}
