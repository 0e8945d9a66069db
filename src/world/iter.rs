//! The merged walk over several component tables.
//!
//! Each table contributes a [`Cursor`] that only ever moves forward.
//! The walk position is the lowest entity among all cursors,
//! so every entity present in any walked table is visited exactly once, in increasing order.

use std::any::Any;
use std::fmt;

use parking_lot::RwLockReadGuard;

use super::tables::Tables;
use crate::comp::Component;
use crate::storage::{Position, Table};
use crate::util::DbgTypeId;
use crate::{Entity, World};

/// A forward-only position inside one table.
pub(crate) trait Cursor {
    /// Returns the entity the cursor is at, or `None` if the table is exhausted.
    fn current(&self) -> Option<Entity>;

    /// Returns whether the slot under the cursor holds a value.
    ///
    /// This is only false in a dirty walk, for slots whose value was removed.
    fn is_occupied(&self) -> bool;

    /// Moves to the first candidate slot at or after `target`. Never moves backward.
    fn advance_to(&mut self, target: Entity);

    /// Moves past the end of the table.
    fn exhaust(&mut self);

    /// Returns the locked table, which is a `Table<C>` for the component type of this cursor.
    fn table(&self) -> &dyn Any;

    /// Clones the value under the cursor into `dest` for `entity`.
    fn copy_to(&self, dest: &mut Tables, entity: Entity);
}

pub(crate) struct TableCursor<'w, C> {
    table:      RwLockReadGuard<'w, Table<C>>,
    position:   Option<Position>,
    dirty_only: bool,
}

impl<'w, C: Component> TableCursor<'w, C> {
    pub(crate) fn new(table: RwLockReadGuard<'w, Table<C>>, dirty_only: bool) -> Self {
        let position = table.seek(0, Entity::MIN, dirty_only);
        Self { table, position, dirty_only }
    }
}

impl<'w, C: Component> Cursor for TableCursor<'w, C> {
    fn current(&self) -> Option<Entity> {
        self.position.map(|position| self.table.entity_at(position))
    }

    fn is_occupied(&self) -> bool {
        self.position.map_or(false, |position| self.table.get_at(position).is_some())
    }

    fn advance_to(&mut self, target: Entity) {
        let position = match self.position {
            Some(position) => position,
            None => return,
        };
        if self.table.entity_at(position) < target {
            self.position = self.table.seek(position.page, target, self.dirty_only);
        }
    }

    fn exhaust(&mut self) { self.position = None; }

    fn table(&self) -> &dyn Any { &*self.table }

    fn copy_to(&self, dest: &mut Tables, entity: Entity) {
        if let Some(value) = self.position.and_then(|position| self.table.get_at(position)) {
            dest.ensure::<C>().add(entity, value.clone());
        }
    }
}

/// Walks the entities of several tables in increasing order.
///
/// Holds a read lock on every walked table until dropped.
///
/// ```
/// # use pagec::World;
/// let mut world = World::new();
/// world.add_entity((1_u32,));
/// world.add_entity((2_u64,));
///
/// let mut iter = world.iter();
/// while let Some(entity) = iter.current() {
///     println!("{entity}: {:?} {:?}", iter.get::<u32>(), iter.get::<u64>());
///     iter.advance();
/// }
/// ```
pub struct EntityIter<'w> {
    cursors: Vec<(DbgTypeId, Box<dyn Cursor + 'w>)>,
    current: Option<Entity>,
}

impl<'w> EntityIter<'w> {
    pub(crate) fn new(cursors: Vec<(DbgTypeId, Box<dyn Cursor + 'w>)>) -> Self {
        let mut iter = Self { cursors, current: None };
        iter.current = iter.min_current();
        iter
    }

    fn min_current(&self) -> Option<Entity> {
        self.cursors.iter().filter_map(|(_, cursor)| cursor.current()).min()
    }

    /// Returns the entity at the current position, or `None` if the walk is complete.
    pub fn current(&self) -> Option<Entity> { self.current }

    /// Returns whether the walk has not completed yet.
    pub fn is_valid(&self) -> bool { self.current.is_some() }

    /// Moves to the next entity present in any walked table and returns it.
    pub fn advance(&mut self) -> Option<Entity> {
        let current = self.current?;
        match current.successor() {
            Some(next) => {
                for (_, cursor) in &mut self.cursors {
                    cursor.advance_to(next);
                }
            }
            None => {
                for (_, cursor) in &mut self.cursors {
                    cursor.exhaust();
                }
            }
        }
        self.current = self.min_current();
        self.current
    }

    fn cursor_here(&self, ty: DbgTypeId) -> Option<&dyn Cursor> {
        let current = self.current?;
        let (_, cursor) = self.cursors.iter().find(|(cursor_ty, _)| *cursor_ty == ty)?;
        (cursor.current() == Some(current)).then_some(&**cursor)
    }

    /// Returns the component of type `C` for the current entity.
    ///
    /// Returns `None` if the walk is complete, `C` is not walked,
    /// or the current entity has no `C`.
    pub fn get<C: Component>(&self) -> Option<&C> {
        let current = self.current?;
        let cursor = self.cursor_here(DbgTypeId::of::<C>())?;
        let table =
            cursor.table().downcast_ref::<Table<C>>().expect("cursor is keyed by its table type");
        table.get(current)
    }

    /// Returns whether the current entity has a component of type `ty`.
    pub fn has(&self, ty: DbgTypeId) -> bool {
        self.cursor_here(ty).map_or(false, |cursor| cursor.is_occupied())
    }

    /// Returns the component types that the current entity has among the walked tables.
    pub fn types(&self) -> impl Iterator<Item = DbgTypeId> + '_ {
        self.cursors.iter().map(|&(ty, _)| ty).filter(|&ty| self.has(ty))
    }

    /// Copies every walked component of the current entity to a new entity in `dest`.
    ///
    /// Returns the new entity, or `None` if the walk is complete.
    pub fn copy_to_world(&self, dest: &mut World) -> Option<Entity> {
        let current = self.current?;
        let entity = dest.ealloc.allocate();
        for (_, cursor) in &self.cursors {
            if cursor.current() == Some(current) {
                cursor.copy_to(&mut dest.tables, entity);
            }
        }
        Some(entity)
    }

    /// Converts the walk into an iterator over the visited entities.
    pub fn entities(self) -> Entities<'w> { Entities { iter: self, started: false } }
}

impl<'w> fmt::Debug for EntityIter<'w> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EntityIter")
            .field("types", &self.cursors.iter().map(|(ty, _)| ty).collect::<Vec<_>>())
            .field("current", &self.current)
            .finish()
    }
}

/// An iterator over the entities of an [`EntityIter`] walk.
pub struct Entities<'w> {
    iter:    EntityIter<'w>,
    started: bool,
}

impl<'w> Iterator for Entities<'w> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        if self.started {
            self.iter.advance()
        } else {
            self.started = true;
            self.iter.current()
        }
    }
}
