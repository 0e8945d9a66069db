//! The world stores every entity and component, and the queries cached over them.
//!
//! # Frame protocol
//! Structural changes must not overlap a system dispatch.
//! A typical frame therefore runs in four phases:
//!
//! 1. [`World::update_queries`] rebuilds the queries whose component types changed.
//! 2. [`SystemSet::run`](crate::SystemSet::run) dispatches systems,
//!    which read and write component values through query views and record commands.
//! 3. [`World::execute_commands`] applies the recorded commands in submission order.
//! 4. [`World::clean_up_pages`] frees empty pages and clears the dirty bits.

use std::collections::HashSet;

use parking_lot::{MappedRwLockReadGuard, RwLockReadGuard};

use crate::comp::{Bundle, Component};
use crate::entity::{AttachedTo, Ealloc, MapEntities, Remap};
use crate::query::{self, Query, Shape};
use crate::storage::Table;
use crate::util::DbgTypeId;
use crate::{command, Entity};

mod iter;
pub use iter::{Entities, EntityIter};

pub(crate) mod tables;
use tables::Tables;


/// Stores the component tables, the query cache and the command buffer.
#[derive(Default)]
pub struct World {
    pub(crate) ealloc: Ealloc,
    pub(crate) tables: Tables,
    queries:           query::Set,
    commands:          command::Buffer,
    executing:         bool,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self { Self::default() }

    /// Allocates a new entity and inserts each component of the bundle for it.
    pub fn add_entity<B: Bundle>(&mut self, components: B) -> Entity {
        let entity = self.ealloc.allocate();
        components.insert_into(self, entity);
        entity
    }

    /// Removes every component of `entity`.
    ///
    /// If `cascade` is true, every entity [attached](AttachedTo) to a removed entity
    /// is removed as well, recursively.
    /// Returns the number of entities that had at least one component removed.
    pub fn remove_entity(&mut self, entity: Entity, cascade: bool) -> usize {
        let mut queue = vec![entity];
        let mut visited = HashSet::new();
        let mut removed = 0;

        while let Some(entity) = queue.pop() {
            if !visited.insert(entity) {
                continue;
            }

            if cascade {
                if let Some(attachments) = self.tables.get_mut::<AttachedTo>() {
                    queue.extend(
                        attachments
                            .iter()
                            .filter(|&(_, parent)| parent.0 == entity)
                            .map(|(child, _)| child),
                    );
                }
            }

            let mut had_components = false;
            for (_, table) in self.tables.iter_mut() {
                had_components |= table.remove(entity);
            }
            if had_components {
                removed += 1;
            }
        }

        removed
    }

    /// Removes every component and restarts entity allocation from 1.
    ///
    /// Tables stay registered so that existing queries remain usable.
    /// Must not be called while any entity walk or system dispatch is in progress.
    pub fn reset_entities(&mut self) {
        for (_, table) in self.tables.iter_mut() {
            table.clear();
        }
        self.ealloc.reset();
    }

    /// Stores `value` for `entity`, overwriting the existing value if any.
    pub fn add_component<C: Component>(&mut self, entity: Entity, value: C) -> &mut C {
        self.tables.ensure::<C>().add(entity, value)
    }

    /// Removes the `C` value of `entity`.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> Option<C> {
        self.tables.get_mut::<C>()?.remove(entity)
    }

    /// Returns the `C` value of `entity`.
    ///
    /// # Panics
    /// Panics if a system is writing to the `C` table concurrently.
    pub fn get<C: Component>(&self, entity: Entity) -> Option<MappedRwLockReadGuard<'_, C>> {
        RwLockReadGuard::try_map(self.tables.read::<C>()?, |table| table.get(entity)).ok()
    }

    /// Returns the `C` value of `entity` mutably.
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        self.tables.get_mut::<C>()?.get_mut(entity)
    }

    /// Returns whether any table has a value for `entity`.
    pub fn contains(&self, entity: Entity) -> bool {
        self.tables.iter().any(|(_, table)| table.contains(entity))
    }

    /// Returns a shared lock on the `C` table, or `None` if `C` has never been used.
    pub fn table<C: Component>(&self) -> Option<RwLockReadGuard<'_, Table<C>>> {
        self.tables.read::<C>()
    }

    /// Returns the `C` table, creating it if `C` has never been used.
    pub fn table_mut<C: Component>(&mut self) -> &mut Table<C> { self.tables.ensure::<C>() }

    /// Returns the number of component types used so far.
    pub fn table_count(&self) -> usize { self.tables.len() }

    /// Returns the allocator of entity IDs for this world.
    pub fn ealloc(&self) -> &Ealloc { &self.ealloc }

    /// Walks every entity present in any table.
    pub fn iter(&self) -> EntityIter<'_> { self.tables.walk(None, false) }

    /// Walks every entity present in any of the tables of `types`.
    ///
    /// Types that have never been used are ignored.
    pub fn iter_types(&self, types: &[DbgTypeId]) -> EntityIter<'_> {
        self.tables.walk(Some(types), false)
    }

    /// Walks the entities whose slots changed since the last
    /// [`clean_up_pages`](Self::clean_up_pages).
    ///
    /// Removed entities are visited too, but [`EntityIter::get`] returns `None` for them.
    /// If `types` is `None`, all tables are walked.
    pub fn iter_dirty(&self, types: Option<&[DbgTypeId]>) -> EntityIter<'_> {
        self.tables.walk(types, true)
    }

    /// Copies every entity of `template` into this world.
    ///
    /// [`AttachedTo`] components of the copies are remapped to point to the copied parents.
    /// Other components storing entities can be fixed up with
    /// [`remap_component`](Self::remap_component).
    pub fn instantiate(&mut self, template: &World) -> Remap {
        let mut remap = Remap::new();
        let mut iter = template.iter();
        while let Some(source) = iter.current() {
            let dest = iter.copy_to_world(self).expect("walk is not complete");
            remap.push(source, dest);
            iter.advance();
        }
        drop(iter);

        self.remap_component::<AttachedTo>(&remap);
        remap
    }

    /// Rewrites the entity references in the `C` values of the destination entities of `remap`.
    pub fn remap_component<C: Component + MapEntities>(&mut self, remap: &Remap) {
        if let Some(table) = self.tables.get_mut::<C>() {
            for dest in remap.dests() {
                if let Some(value) = table.get_mut(dest) {
                    value.map_entities(remap);
                }
            }
        }
    }

    /// Returns the shared query for the shape `Q`, creating it on first use.
    ///
    /// Queries with the same shape share one result set.
    /// A new query is stale until the next [`update_queries`](Self::update_queries).
    ///
    /// # Panics
    /// Panics if `Q` requests the same component type more than once
    /// with at least one mutable access.
    pub fn query<Q: Shape>(&mut self) -> Query<Q> {
        Q::register(&mut self.tables);
        self.queries.get_or_create::<Q>()
    }

    /// Scans the tables for occupancy changes and marks the dependent queries stale.
    ///
    /// Returns the number of changed tables.
    fn scan_changes(&mut self) -> usize {
        let changed: Vec<DbgTypeId> = self
            .tables
            .iter_mut()
            .filter_map(|(ty, table)| table.take_changed().then_some(ty))
            .collect();
        if !changed.is_empty() {
            self.queries.invalidate(&changed);
        }
        changed.len()
    }

    /// Brings every live query up to date.
    ///
    /// Tables changed by direct mutation since the last scan are detected first,
    /// queries no longer referenced outside the world are dropped,
    /// and every stale query is rebuilt in a single merged walk.
    /// Returns the number of rebuilt queries.
    ///
    /// Must not be called while any query is being viewed.
    pub fn update_queries(&mut self) -> usize {
        self.scan_changes();
        self.queries.collect_garbage();
        self.queries.update(&self.tables)
    }

    /// Returns the number of queries cached in this world.
    pub fn query_count(&self) -> usize { self.queries.len() }

    /// Returns a handle to record structural changes into the command buffer.
    pub fn commands(&self) -> command::Commands<'_> {
        command::Commands::new(&self.commands, &self.ealloc)
    }

    /// Returns the command buffer of this world.
    pub fn command_buffer(&self) -> &command::Buffer { &self.commands }

    /// Applies every recorded command in submission order, then scans for changes once.
    ///
    /// Commands recorded while executing are appended to the queue and executed in the same call,
    /// so the buffer is empty when this returns.
    /// Returns the number of executed commands.
    ///
    /// # Panics
    /// Panics if called from a command.
    pub fn execute_commands(&mut self) -> usize {
        assert!(!self.executing, "execute_commands cannot be called from a command");

        let mut count = 0;
        {
            let mut guard = Executing::new(self);
            loop {
                let operations = guard.0.commands.take();
                if operations.is_empty() {
                    break;
                }

                count += operations.len();
                for operation in operations {
                    operation.run(&mut *guard.0);
                }
            }
        }

        if count == 0 {
            return 0;
        }

        let changed = self.scan_changes();
        log::trace!("Executed {count} commands, {changed} tables changed");
        count
    }

    /// Frees the pages without components and clears all dirty bits.
    ///
    /// Returns the number of freed pages.
    pub fn clean_up_pages(&mut self) -> usize {
        let freed = self.tables.iter_mut().map(|(_, table)| table.clean_up_pages()).sum();
        log::trace!("Freed {freed} empty pages");
        freed
    }
}

/// Marks a world as executing commands until dropped, including on unwind.
struct Executing<'w>(&'w mut World);

impl<'w> Executing<'w> {
    fn new(world: &'w mut World) -> Self {
        world.executing = true;
        Self(world)
    }
}

impl Drop for Executing<'_> {
    fn drop(&mut self) { self.0.executing = false; }
}
