use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use indexmap::IndexSet;
use parking_lot::Mutex;

/// Records events and asserts that they happen in a required partial order.
pub struct EventTracer<T: fmt::Debug + Eq + Hash> {
    /// Maps each event to the events that must happen before it.
    prerequisites: HashMap<T, Vec<T>>,
    seen:          Mutex<IndexSet<T>>,
}

impl<T: fmt::Debug + Eq + Hash> EventTracer<T> {
    /// Creates a tracer that asserts `before` is traced earlier than `after`
    /// for each `(before, after)` pair.
    pub fn new(orders: impl IntoIterator<Item = (T, T)>) -> Self {
        let mut prerequisites: HashMap<T, Vec<T>> = HashMap::new();
        for (before, after) in orders {
            prerequisites.entry(after).or_default().push(before);
        }
        Self { prerequisites, seen: Mutex::new(IndexSet::new()) }
    }

    /// Records that `event` has happened.
    ///
    /// # Panics
    /// Panics if `event` was traced before or one of its prerequisites was not traced yet.
    pub fn trace(&self, event: T) {
        let mut seen = self.seen.lock();

        for prerequisite in self.prerequisites.get(&event).into_iter().flatten() {
            assert!(
                seen.contains(prerequisite),
                "{event:?} should happen after {prerequisite:?}"
            );
        }

        let (index, new) = seen.insert_full(event);
        assert!(
            new,
            "{:?} is traced twice",
            seen.get_index(index).expect("insert_full should return valid index")
        );
    }

    /// Returns the traced events in the order they happened.
    pub fn get_events(self) -> Vec<T> { self.seen.into_inner().into_iter().collect() }
}
