use std::collections::VecDeque;

use crate::delta::Delta;

/// Bounded ring of the most recent deltas, replayed to late joiners.
///
/// When full, appending evicts the oldest entry.
#[derive(Debug)]
pub struct DeltaStore {
    deltas: VecDeque<Delta>,
    capacity: usize,
}

impl DeltaStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            deltas: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, delta: Delta) {
        self.deltas.push_back(delta);
        while self.deltas.len() > self.capacity {
            self.deltas.pop_front();
        }
    }

    /// Point-in-time copy of the stored deltas, oldest first.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            deltas: self.deltas.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Frozen view of a [`DeltaStore`]. Iterating borrows, so it can be walked
/// any number of times.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    deltas: Vec<Delta>,
}

impl Snapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, Delta> {
        self.deltas.iter()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Delta;
    type IntoIter = std::slice::Iter<'a, Delta>;

    fn into_iter(self) -> Self::IntoIter {
        self.deltas.iter()
    }
}
