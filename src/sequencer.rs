// ============================================================================
// SEQUENCER.RS - Event Ordering
// ============================================================================
//
// Score lines can come in any order. Before playback the events are put into
// time order by inserting them into a binary search tree keyed by
// bar * 10 + index, then reading the tree back in order.
//
// The tree lives in a flat Vec (an "arena"): each node stores the indices of
// its children instead of pointers. Insertion walks down from the root, and
// the in-order walk uses an explicit stack, so very long scores cannot blow
// the call stack.
//
// DUPLICATES:
// Two notes at exactly the same bar and index share a key. The first one
// inserted keeps its slot; later ones are dropped without complaint.
// ============================================================================

use std::cmp::Ordering;

use log::debug;

use crate::score::ScoreEvent;

// ============================================================================
// EVENT SEQUENCER (the tree)
// ============================================================================

/// One tree node: an event plus the arena indices of its children
#[derive(Clone, Debug)]
struct Node {
    event: ScoreEvent,
    left: Option<usize>,
    right: Option<usize>,
}

/// Binary search tree that puts score events into playback order
#[derive(Clone, Debug, Default)]
pub struct EventSequencer {
    nodes: Vec<Node>,
}

impl EventSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event
    /// Returns false (and drops the event) when its key is already taken
    pub fn insert(&mut self, event: ScoreEvent) -> bool {
        let new_index = self.nodes.len();
        let key = event.key();

        // The root is always node 0; an empty arena just takes the new node.
        if !self.nodes.is_empty() {
            let mut current = 0;
            loop {
                let node = &mut self.nodes[current];
                let next = match key.total_cmp(&node.event.key()) {
                    Ordering::Less => &mut node.left,
                    Ordering::Greater => &mut node.right,
                    Ordering::Equal => {
                        debug!(
                            "duplicate note at bar {} index {}, keeping the first one",
                            event.bar(),
                            event.index()
                        );
                        return false;
                    }
                };

                match *next {
                    Some(child) => current = child,
                    None => {
                        *next = Some(new_index);
                        break;
                    }
                }
            }
        }

        self.nodes.push(Node {
            event,
            left: None,
            right: None,
        });
        true
    }

    /// Number of distinct events stored
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Freezes the tree into a time-ordered sequence (in-order traversal)
    pub fn into_sequence(self) -> OrderedEventSequence {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = Vec::new();
        let mut cursor = if self.nodes.is_empty() { None } else { Some(0) };

        while cursor.is_some() || !stack.is_empty() {
            while let Some(index) = cursor {
                stack.push(index);
                cursor = self.nodes[index].left;
            }
            if let Some(index) = stack.pop() {
                ordered.push(self.nodes[index].event);
                cursor = self.nodes[index].right;
            }
        }

        OrderedEventSequence { events: ordered }
    }
}

impl FromIterator<ScoreEvent> for EventSequencer {
    fn from_iter<I: IntoIterator<Item = ScoreEvent>>(iter: I) -> Self {
        let mut sequencer = EventSequencer::new();
        for event in iter {
            sequencer.insert(event);
        }
        sequencer
    }
}

// ============================================================================
// ORDERED EVENT SEQUENCE
// ============================================================================

/// Score events in strictly increasing (bar, index) order, ready for playback
#[derive(Clone, Debug, Default)]
pub struct OrderedEventSequence {
    events: Vec<ScoreEvent>,
}

impl OrderedEventSequence {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&ScoreEvent> {
        self.events.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoreEvent> {
        self.events.iter()
    }

    /// Bar of the first event (None when empty)
    pub fn first_bar(&self) -> Option<u32> {
        self.events.first().map(|event| event.bar())
    }

    /// Highest bar that holds a note (None when empty)
    pub fn max_bar(&self) -> Option<u32> {
        self.events.last().map(|event| event.bar())
    }
}

impl<'a> IntoIterator for &'a OrderedEventSequence {
    type Item = &'a ScoreEvent;
    type IntoIter = std::slice::Iter<'a, ScoreEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
