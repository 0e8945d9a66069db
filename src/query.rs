//! Queries cache the entities that have a particular combination of components.
//!
//! A query is declared by its [`Shape`], a tuple of access types:
//!
//! ```
//! use pagec::query::{Read, ReadOptional, Write};
//! use pagec::World;
//!
//! #[derive(Clone)]
//! struct Position(f32);
//! #[derive(Clone)]
//! struct Velocity(f32);
//! #[derive(Clone)]
//! struct Drag(f32);
//!
//! let mut world = World::new();
//! world.add_entity((Position(0.0), Velocity(1.0)));
//! world.add_entity((Position(0.0), Velocity(2.0), Drag(0.5)));
//! world.add_entity((Position(0.0),));
//!
//! let query = world.query::<(Write<Position>, Read<Velocity>, ReadOptional<Drag>)>();
//! world.update_queries();
//!
//! let mut view = query.view(&world);
//! assert_eq!(view.len(), 2);
//! view.for_each(|_entity, (position, velocity, drag)| {
//!     position.0 += velocity.0 * drag.map_or(1.0, |drag| drag.0);
//! });
//! ```
//!
//! An entity is a row of the query if it has every [`Read`] and [`Write`] column.
//! Optional columns never exclude a row,
//! but a query with only optional columns requires at least one of them.
//!
//! Query results are rebuilt from scratch by [`World::update_queries`]
//! whenever a table of any column gains or loses a component.
//! Overwriting an existing component does not invalidate queries,
//! so results track membership only; values are always read live from the tables.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::lock_api::ArcRwLockReadGuard;
use parking_lot::{RawRwLock, RwLock};

use crate::world::EntityIter;
use crate::{Entity, World};

mod shape;
pub use shape::{Access, Column, Mode, Read, ReadOptional, Shape, Write, WriteOptional};

mod set;
pub(crate) use set::Set;

#[cfg(test)]
mod tests;

/// The cached result of a query.
pub(crate) struct State {
    columns:  Vec<Column>,
    /// Sorted in increasing order.
    rows:     Vec<Entity>,
    stale:    bool,
    rebuilds: usize,
}

impl State {
    fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new(), stale: true, rebuilds: 0 }
    }

    /// Appends the current entity of `iter` if it completes a row.
    fn consider(&mut self, entity: Entity, iter: &EntityIter<'_>) {
        let mut any_present = false;
        for column in &self.columns {
            let present = iter.has(column.ty);
            if column.mode.is_required() && !present {
                return;
            }
            any_present |= present;
        }

        if any_present {
            debug_assert!(self.rows.last() < Some(&entity), "entities are considered in order");
            self.rows.push(entity);
        }
    }
}

/// A handle to a query cached in a [`World`].
///
/// Handles are cheap to clone.
/// The world drops a cached query once all its handles are dropped.
pub struct Query<Q: Shape> {
    state: Arc<RwLock<State>>,
    _ph:   PhantomData<fn() -> Q>,
}

impl<Q: Shape> Clone for Query<Q> {
    fn clone(&self) -> Self { Self { state: Arc::clone(&self.state), _ph: PhantomData } }
}

impl<Q: Shape> fmt::Debug for Query<Q> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Query")
            .field("columns", &state.columns)
            .field("rows", &state.rows.len())
            .field("stale", &state.stale)
            .finish()
    }
}

impl<Q: Shape> Query<Q> {
    pub(crate) fn new(state: Arc<RwLock<State>>) -> Self { Self { state, _ph: PhantomData } }

    /// Returns the columns of the query.
    pub fn columns(&self) -> Vec<Column> { self.state.read().columns.clone() }

    /// Returns the entities in the query results, in increasing order.
    pub fn entities(&self) -> Vec<Entity> { self.state.read().rows.clone() }

    /// Returns the number of rows.
    pub fn len(&self) -> usize { self.state.read().rows.len() }

    /// Returns whether there are no rows.
    pub fn is_empty(&self) -> bool { self.state.read().rows.is_empty() }

    /// Returns whether `entity` is a row of the query.
    pub fn contains(&self, entity: Entity) -> bool {
        self.state.read().rows.binary_search(&entity).is_ok()
    }

    /// Returns whether the results are outdated and will be rebuilt on the next update.
    pub fn is_stale(&self) -> bool { self.state.read().stale }

    /// Returns the number of times the results have been rebuilt.
    pub fn rebuild_count(&self) -> usize { self.state.read().rebuilds }

    /// Locks the component tables of the query for access.
    ///
    /// Inside a system, use [`Run::view`](crate::system::Run::view) instead.
    ///
    /// # Panics
    /// Panics if a table is locked incompatibly, e.g. by another view writing to it.
    pub fn view<'w>(&self, world: &'w World) -> View<'w, Q> {
        View { state: self.state.read_arc(), guards: Q::lock(&world.tables) }
    }
}

/// Locked access to the rows of a [`Query`].
pub struct View<'w, Q: Shape> {
    state:  ArcRwLockReadGuard<RawRwLock, State>,
    guards: Q::Guards<'w>,
}

impl<'w, Q: Shape> View<'w, Q> {
    /// Returns the entities in the query results, in increasing order.
    pub fn entities(&self) -> &[Entity] { &self.state.rows }

    /// Returns the number of rows.
    pub fn len(&self) -> usize { self.state.rows.len() }

    /// Returns whether there are no rows.
    pub fn is_empty(&self) -> bool { self.state.rows.is_empty() }

    /// Returns the row for `entity`.
    ///
    /// Returns `None` if `entity` is not a row of the query.
    pub fn get(&mut self, entity: Entity) -> Option<Q::Item<'_>> {
        self.state.rows.binary_search(&entity).ok()?;
        Q::fetch(&mut self.guards, entity)
    }

    /// Calls `f` for every row in increasing entity order.
    pub fn for_each(&mut self, mut f: impl FnMut(Entity, Q::Item<'_>)) {
        for &entity in &self.state.rows {
            if let Some(item) = Q::fetch(&mut self.guards, entity) {
                f(entity, item);
            }
        }
    }
}
