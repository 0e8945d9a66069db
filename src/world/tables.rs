//! The type-erased registry of component tables.

use std::any::{self, Any};

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::iter::{Cursor, EntityIter, TableCursor};
use crate::comp::Component;
use crate::storage::Table;
use crate::util::DbgTypeId;
use crate::Entity;

/// Operations on a component table that do not depend on the component type.
pub(crate) trait AnyTable: Send + Sync {
    /// Returns `self` for downcasting to [`TableCell`].
    fn as_any(&self) -> &dyn Any;

    /// Returns `self` for downcasting to [`TableCell`].
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Removes the value for `entity`, returning whether it was present.
    fn remove(&mut self, entity: Entity) -> bool;

    fn contains(&self, entity: Entity) -> bool;

    fn take_changed(&mut self) -> bool;

    fn clean_up_pages(&mut self) -> usize;

    fn clear(&mut self);

    /// Creates a cursor over the occupied (or dirty) slots, holding a read lock on the table.
    fn cursor(&self, dirty_only: bool) -> Box<dyn Cursor + '_>;
}

/// A table behind a lock so that systems can access it through `&World`.
///
/// Direct mutation through `&mut World` bypasses the lock with [`RwLock::get_mut`].
pub(crate) struct TableCell<C>(RwLock<Table<C>>);

impl<C: Component> TableCell<C> {
    fn try_read(&self) -> RwLockReadGuard<'_, Table<C>> {
        match self.0.try_read() {
            Some(guard) => guard,
            None => panic!(
                "The component {} is currently exclusively locked by another system. Maybe \
                 scheduler bug?",
                any::type_name::<C>()
            ),
        }
    }

    fn try_write(&self) -> RwLockWriteGuard<'_, Table<C>> {
        match self.0.try_write() {
            Some(guard) => guard,
            None => panic!(
                "The component {} is currently used by another system. Maybe scheduler bug?",
                any::type_name::<C>()
            ),
        }
    }
}

impl<C: Component> AnyTable for TableCell<C> {
    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn remove(&mut self, entity: Entity) -> bool { self.0.get_mut().remove(entity).is_some() }

    fn contains(&self, entity: Entity) -> bool { self.try_read().contains(entity) }

    fn take_changed(&mut self) -> bool { self.0.get_mut().take_changed() }

    fn clean_up_pages(&mut self) -> usize { self.0.get_mut().clean_up_pages() }

    fn clear(&mut self) { self.0.get_mut().clear() }

    fn cursor(&self, dirty_only: bool) -> Box<dyn Cursor + '_> {
        Box::new(TableCursor::new(self.try_read(), dirty_only))
    }
}

/// Stores one table per component type, in order of first use.
///
/// Only constructed inside a [`World`](crate::World).
#[derive(Default)]
pub struct Tables {
    map: IndexMap<DbgTypeId, Box<dyn AnyTable>>,
}

impl Tables {
    /// Returns the table for `C`, creating it if this is the first use of `C`.
    pub(crate) fn ensure<C: Component>(&mut self) -> &mut Table<C> {
        let table = self.map.entry(DbgTypeId::of::<C>()).or_insert_with(|| {
            let cell: Box<dyn AnyTable> = Box::new(TableCell::<C>(RwLock::new(Table::new())));
            cell
        });
        downcast_mut::<C>(&mut **table).0.get_mut()
    }

    pub(crate) fn get_mut<C: Component>(&mut self) -> Option<&mut Table<C>> {
        let table = self.map.get_mut(&DbgTypeId::of::<C>())?;
        Some(downcast_mut::<C>(&mut **table).0.get_mut())
    }

    fn cell<C: Component>(&self) -> Option<&TableCell<C>> {
        let table = self.map.get(&DbgTypeId::of::<C>())?;
        Some(downcast_ref::<C>(&**table))
    }

    /// Acquires a shared lock on the table for `C`.
    ///
    /// # Panics
    /// Panics if the table is exclusively locked.
    pub(crate) fn read<C: Component>(&self) -> Option<RwLockReadGuard<'_, Table<C>>> {
        Some(self.cell::<C>()?.try_read())
    }

    /// Acquires an exclusive lock on the table for `C`.
    ///
    /// # Panics
    /// Panics if the table is locked.
    pub(crate) fn write<C: Component>(&self) -> Option<RwLockWriteGuard<'_, Table<C>>> {
        Some(self.cell::<C>()?.try_write())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (DbgTypeId, &dyn AnyTable)> + '_ {
        self.map.iter().map(|(&ty, table)| (ty, &**table))
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (DbgTypeId, &mut Box<dyn AnyTable>)> + '_ {
        self.map.iter_mut().map(|(&ty, table)| (ty, table))
    }

    pub(crate) fn len(&self) -> usize { self.map.len() }

    /// Starts a merged walk over the tables of `types`, or all tables if `types` is `None`.
    pub(crate) fn walk(&self, types: Option<&[DbgTypeId]>, dirty_only: bool) -> EntityIter<'_> {
        let cursors = self
            .iter()
            .filter(|(ty, _)| types.map_or(true, |types| types.contains(ty)))
            .map(|(ty, table)| (ty, table.cursor(dirty_only)))
            .collect();
        EntityIter::new(cursors)
    }
}

fn downcast_ref<C: Component>(table: &dyn AnyTable) -> &TableCell<C> {
    match table.as_any().downcast_ref() {
        Some(cell) => cell,
        None => panic!("table keyed by {} has a different type", any::type_name::<C>()),
    }
}

fn downcast_mut<C: Component>(table: &mut dyn AnyTable) -> &mut TableCell<C> {
    match table.as_any_mut().downcast_mut() {
        Some(cell) => cell,
        None => panic!("table keyed by {} has a different type", any::type_name::<C>()),
    }
}
