//! Manages entity ID allocation.

use std::sync::atomic::{AtomicU32, Ordering};

use super::Entity;

/// A monotonic entity ID allocator.
///
/// Allocation only requires shared access,
/// so that command buffers can reserve IDs while systems are running.
#[derive(Debug)]
pub struct Ealloc {
    /// The raw value of the next ID to allocate.
    next: AtomicU32,
}

impl Default for Ealloc {
    fn default() -> Self { Self::new() }
}

impl Ealloc {
    /// Creates an allocator whose first ID is `1`.
    pub fn new() -> Self { Self { next: AtomicU32::new(1) } }

    /// Allocates a new ID, strictly greater than every ID allocated before.
    ///
    /// # Panics
    /// Panics if the 32-bit ID space has been exhausted.
    pub fn allocate(&self) -> Entity {
        let raw = match self.next.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
            next.checked_add(1)
        }) {
            Ok(raw) => raw,
            Err(_) => panic!("Entity ID space exhausted after {} allocations", u32::MAX - 1),
        };
        Entity::new(raw).expect("the counter starts at 1 and never wraps")
    }

    /// Returns the ID that the next call to [`allocate`](Self::allocate) would return.
    pub fn peek(&self) -> Option<Entity> { Entity::new(self.next.load(Ordering::Relaxed)) }

    /// Returns whether `entity` was ever returned by this allocator.
    pub fn is_allocated(&self, entity: Entity) -> bool {
        entity.get() < self.next.load(Ordering::Relaxed)
    }

    /// Restarts allocation from `1`.
    ///
    /// Requires unique access so that no allocation can race with the reset.
    pub fn reset(&mut self) { *self.next.get_mut() = 1; }
}
