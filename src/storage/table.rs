use std::mem;

use super::{Page, PageId};
use crate::Entity;

/// Stores every component of type `C`.
///
/// Pages are kept sorted by [`PageId`] and located by binary search.
pub struct Table<C> {
    pages:       Vec<Page<C>>,
    changed:     bool,
    cardinality: usize,
}

/// A cursor location inside a table: the index into the page list and the slot within that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Position {
    pub(crate) page: usize,
    pub(crate) slot: usize,
}

impl<C> Default for Table<C> {
    fn default() -> Self { Self { pages: Vec::new(), changed: false, cardinality: 0 } }
}

impl<C> Table<C> {
    /// Creates an empty table.
    pub fn new() -> Self { Self::default() }

    fn page_index(&self, id: PageId) -> Result<usize, usize> {
        self.pages.binary_search_by_key(&id, |page| page.id())
    }

    fn page_of(&self, entity: Entity) -> Option<&Page<C>> {
        let index = self.page_index(entity.page()).ok()?;
        self.pages.get(index)
    }

    fn page_of_mut(&mut self, entity: Entity) -> Option<&mut Page<C>> {
        let index = self.page_index(entity.page()).ok()?;
        self.pages.get_mut(index)
    }

    /// Stores `value` for `entity`, overwriting the existing value if any.
    ///
    /// The table is flagged as changed only if `entity` did not already have a value.
    /// Overwriting only marks the slot dirty.
    pub fn add(&mut self, entity: Entity, value: C) -> &mut C {
        let id = entity.page();
        let index = match self.page_index(id) {
            Ok(index) => index,
            Err(index) => {
                self.pages.insert(index, Page::new(id));
                index
            }
        };

        let page = self.pages.get_mut(index).expect("index returned by binary search");
        let slot = entity.slot();
        if page.insert(slot, value).is_none() {
            self.changed = true;
            self.cardinality += 1;
        }
        page.get_mut(slot).expect("value was just inserted")
    }

    /// Returns the value for `entity`.
    pub fn get(&self, entity: Entity) -> Option<&C> { self.page_of(entity)?.get(entity.slot()) }

    /// Returns the value for `entity` mutably.
    ///
    /// Mutating a value in place does not mark its slot dirty.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut C> {
        self.page_of_mut(entity)?.get_mut(entity.slot())
    }

    /// Returns whether `entity` has a value in this table.
    pub fn contains(&self, entity: Entity) -> bool { self.get(entity).is_some() }

    /// Returns whether the slot of `entity` was added to or removed from since the last clean-up.
    pub fn is_dirty(&self, entity: Entity) -> bool {
        self.page_of(entity).map_or(false, |page| page.is_dirty(entity.slot()))
    }

    /// Removes the value for `entity`.
    pub fn remove(&mut self, entity: Entity) -> Option<C> {
        let old = self.page_of_mut(entity)?.remove(entity.slot());
        if old.is_some() {
            self.changed = true;
            self.cardinality -= 1;
        }
        old
    }

    /// Removes every value, flagging the table as changed if it was not empty.
    pub(crate) fn clear(&mut self) {
        if self.cardinality > 0 {
            self.changed = true;
        }
        self.pages.clear();
        self.cardinality = 0;
    }

    /// Returns whether the occupancy of this table changed since the flag was last taken.
    pub fn has_changed(&self) -> bool { self.changed }

    /// Returns and clears the changed flag.
    pub(crate) fn take_changed(&mut self) -> bool { mem::replace(&mut self.changed, false) }

    /// Frees every page without occupied slots and clears all dirty bits.
    ///
    /// Must not be called while the table is being iterated.
    /// Returns the number of freed pages.
    pub fn clean_up_pages(&mut self) -> usize {
        let before = self.pages.len();
        self.pages.retain_mut(|page| {
            page.clear_dirty();
            !page.is_empty()
        });
        before - self.pages.len()
    }

    /// Returns the number of entities with a value in this table.
    pub fn cardinality(&self) -> usize { self.cardinality }

    /// Returns whether no entity has a value in this table.
    pub fn is_empty(&self) -> bool { self.cardinality == 0 }

    /// Returns the number of allocated pages, including empty pages not yet cleaned up.
    pub fn page_count(&self) -> usize { self.pages.len() }

    /// Iterates over all values in increasing entity order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> + '_ {
        self.pages.iter().flat_map(|page| {
            page.iter().map(move |(slot, value)| (slot_entity(page.id(), slot), value))
        })
    }

    /// Iterates mutably over all values in increasing entity order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> + '_ {
        self.pages.iter_mut().flat_map(|page| {
            let id = page.id();
            page.iter_mut().map(move |(slot, value)| (slot_entity(id, slot), value))
        })
    }

    /// Iterates over the entities whose slots are dirty, in increasing order.
    ///
    /// This includes entities whose value was removed.
    pub fn iter_dirty(&self) -> impl Iterator<Item = Entity> + '_ {
        self.pages.iter().flat_map(|page| {
            let id = page.id();
            page.iter_dirty().map(move |slot| slot_entity(id, slot))
        })
    }

    /// Finds the first occupied (or dirty) slot at or after `from`,
    /// searching only pages at index `start_page` or later.
    pub(crate) fn seek(
        &self,
        start_page: usize,
        from: Entity,
        dirty_only: bool,
    ) -> Option<Position> {
        let target = from.page();
        let rest = self.pages.get(start_page..)?;
        let mut index = start_page + rest.partition_point(|page| page.id() < target);

        let mut from_slot = match self.pages.get(index) {
            Some(page) if page.id() == target => from.slot(),
            _ => 0,
        };
        while let Some(page) = self.pages.get(index) {
            if let Some(slot) = page.next(from_slot, dirty_only) {
                return Some(Position { page: index, slot });
            }
            index += 1;
            from_slot = 0;
        }
        None
    }

    /// Returns the entity at `position`.
    pub(crate) fn entity_at(&self, position: Position) -> Entity {
        let page = self.pages.get(position.page).expect("position out of page list bounds");
        slot_entity(page.id(), position.slot)
    }

    /// Returns the value at `position`.
    pub(crate) fn get_at(&self, position: Position) -> Option<&C> {
        self.pages.get(position.page)?.get(position.slot)
    }
}

fn slot_entity(page: PageId, slot: usize) -> Entity {
    page.entity(slot).expect("slot 0 of page 0 is never stored")
}
