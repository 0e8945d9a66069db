use xias::Xias;

use super::{PAGE_SIZE, SLOT_MASK};
use crate::Entity;

/// Identifies a page, i.e. an entity ID with the slot bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(u32);

impl PageId {
    /// Returns the page that stores `entity`.
    pub fn of(entity: Entity) -> Self { Self(entity.get() & !SLOT_MASK) }

    /// Returns the raw value, which is the ID of the entity in slot 0.
    pub fn get(self) -> u32 { self.0 }

    /// Returns the entity stored at `slot` of this page.
    ///
    /// Returns `None` for slot 0 of page 0, which would be the reserved ID `0`.
    pub fn entity(self, slot: usize) -> Option<Entity> {
        debug_assert!(slot < PAGE_SIZE, "slot {slot} out of page bounds");
        Entity::new(self.0 | slot.small_int::<u32>())
    }
}

/// A fixed block of [`PAGE_SIZE`] slots for one component type.
///
/// The `Option` in each slot is the source of truth for presence;
/// `occupancy` mirrors it as a bit index for fast scanning.
pub(crate) struct Page<C> {
    id:        PageId,
    occupancy: u16,
    dirty:     u16,
    slots:     Box<[Option<C>; PAGE_SIZE]>,
}

impl<C> Page<C> {
    pub(crate) fn new(id: PageId) -> Self {
        Self { id, occupancy: 0, dirty: 0, slots: Box::new(std::array::from_fn(|_| None)) }
    }

    pub(crate) fn id(&self) -> PageId { self.id }

    #[cfg(test)]
    pub(crate) fn occupancy(&self) -> u16 { self.occupancy }

    #[cfg(test)]
    pub(crate) fn dirty(&self) -> u16 { self.dirty }

    pub(crate) fn is_empty(&self) -> bool { self.occupancy == 0 }

    pub(crate) fn is_dirty(&self, slot: usize) -> bool { self.dirty & bit(slot) != 0 }

    pub(crate) fn get(&self, slot: usize) -> Option<&C> {
        let value = self.slots.get(slot).expect("slot out of page bounds").as_ref();
        debug_assert_eq!(value.is_some(), self.occupancy & bit(slot) != 0, "occupancy mismatch");
        value
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> Option<&mut C> {
        self.slots.get_mut(slot).expect("slot out of page bounds").as_mut()
    }

    /// Writes `value` into `slot`, returning the overwritten value if the slot was occupied.
    ///
    /// The dirty bit is set even if the slot was already occupied.
    pub(crate) fn insert(&mut self, slot: usize, value: C) -> Option<C> {
        let cell = self.slots.get_mut(slot).expect("slot out of page bounds");
        self.occupancy |= bit(slot);
        self.dirty |= bit(slot);
        cell.replace(value)
    }

    /// Removes the value in `slot`, marking the slot dirty if a value was present.
    pub(crate) fn remove(&mut self, slot: usize) -> Option<C> {
        let old = self.slots.get_mut(slot).expect("slot out of page bounds").take();
        if old.is_some() {
            self.occupancy &= !bit(slot);
            self.dirty |= bit(slot);
        }
        old
    }

    /// Returns the first occupied slot at or after `from`.
    pub(crate) fn next_occupied(&self, from: usize) -> Option<usize> { scan(self.occupancy, from) }

    /// Returns the first dirty slot at or after `from`.
    pub(crate) fn next_dirty(&self, from: usize) -> Option<usize> { scan(self.dirty, from) }

    pub(crate) fn next(&self, from: usize, dirty_only: bool) -> Option<usize> {
        match dirty_only {
            true => self.next_dirty(from),
            false => self.next_occupied(from),
        }
    }

    pub(crate) fn clear_dirty(&mut self) { self.dirty = 0; }

    /// Iterates over occupied slots in increasing order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &C)> + '_ {
        Ones(self.occupancy).map(move |slot| {
            let value = self.slots.get(slot).expect("slot out of page bounds");
            (slot, value.as_ref().expect("occupancy bit implies presence"))
        })
    }

    /// Iterates mutably over occupied slots in increasing order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut C)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(slot, value)| Some((slot, value.as_mut()?)))
    }

    /// Iterates over dirty slots in increasing order.
    pub(crate) fn iter_dirty(&self) -> impl Iterator<Item = usize> { Ones(self.dirty) }
}

fn bit(slot: usize) -> u16 { 1 << slot }

/// Returns the index of the lowest set bit of `mask` at or above `from`.
fn scan(mask: u16, from: usize) -> Option<usize> {
    if from >= PAGE_SIZE {
        return None;
    }
    let masked = mask & (u16::MAX << from);
    (masked != 0).then(|| masked.trailing_zeros().small_int())
}

/// Iterates over the indices of set bits, lowest first.
struct Ones(u16);

impl Iterator for Ones {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let index = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(index.small_int())
    }
}
