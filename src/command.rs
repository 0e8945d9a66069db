//! Structural changes recorded during a system dispatch and applied afterwards.
//!
//! Systems run while other systems are iterating the same tables,
//! so they must not add or remove entities and components directly.
//! Instead they record commands through [`Commands`],
//! which are applied in submission order by [`World::execute_commands`].

use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::comp::{Bundle, Component};
use crate::entity::{Ealloc, Remap};
use crate::{Entity, World};

#[cfg(test)]
mod tests;

/// An operation to be executed when the buffer is drained.
pub(crate) trait Operation: Send {
    /// Applies the operation to the world.
    fn run(self: Box<Self>, world: &mut World);
}

/// Inserts the components of an entity whose ID was allocated at recording time.
struct AddEntity<B> {
    entity:     Entity,
    components: B,
}

impl<B: Bundle> Operation for AddEntity<B> {
    fn run(self: Box<Self>, world: &mut World) { self.components.insert_into(world, self.entity) }
}

struct RemoveEntity {
    entity:  Entity,
    cascade: bool,
}

impl Operation for RemoveEntity {
    fn run(self: Box<Self>, world: &mut World) {
        world.remove_entity(self.entity, self.cascade);
    }
}

struct AddComponent<C> {
    entity: Entity,
    value:  C,
}

impl<C: Component> Operation for AddComponent<C> {
    fn run(self: Box<Self>, world: &mut World) {
        world.add_component(self.entity, self.value);
    }
}

struct RemoveComponent<C> {
    entity: Entity,
    _ph:    PhantomData<fn() -> C>,
}

impl<C: Component> Operation for RemoveComponent<C> {
    fn run(self: Box<Self>, world: &mut World) {
        world.remove_component::<C>(self.entity);
    }
}

/// Copies a template world, then passes the remap table to a callback.
struct Instantiate<F> {
    template: Arc<World>,
    then:     F,
}

impl<F: FnOnce(&mut World, &Remap) + Send + 'static> Operation for Instantiate<F> {
    fn run(self: Box<Self>, world: &mut World) {
        let remap = world.instantiate(&self.template);
        log::trace!("Instantiated {} entities from template", remap.len());
        (self.then)(world, &remap);
    }
}

struct Defer<F>(F);

impl<F: FnOnce(&mut World) + Send + 'static> Operation for Defer<F> {
    fn run(self: Box<Self>, world: &mut World) { (self.0)(world) }
}

/// The FIFO queue of recorded operations of a world.
///
/// Recording only holds the lock while appending.
#[derive(Default)]
pub struct Buffer {
    operations: Mutex<Vec<Box<dyn Operation>>>,
}

impl Buffer {
    fn push(&self, operation: Box<dyn Operation>) { self.operations.lock().push(operation); }

    /// Removes all recorded operations, leaving the buffer empty.
    pub(crate) fn take(&mut self) -> Vec<Box<dyn Operation>> {
        mem::take(self.operations.get_mut())
    }

    /// Returns the number of recorded operations that have not been executed yet.
    pub fn len(&self) -> usize { self.operations.lock().len() }

    /// Returns whether there are no pending operations.
    pub fn is_empty(&self) -> bool { self.operations.lock().is_empty() }
}

/// Records structural changes to a world.
///
/// Obtained from [`World::commands`] or [`Run::commands`](crate::system::Run::commands).
#[derive(Clone, Copy)]
pub struct Commands<'w> {
    buffer: &'w Buffer,
    ealloc: &'w Ealloc,
}

impl<'w> Commands<'w> {
    pub(crate) fn new(buffer: &'w Buffer, ealloc: &'w Ealloc) -> Self { Self { buffer, ealloc } }

    /// Allocates an entity immediately and records the insertion of its components.
    ///
    /// The returned entity can be referenced by other commands recorded later,
    /// but it has no components until the commands are executed.
    pub fn add_entity<B: Bundle>(&self, components: B) -> Entity {
        let entity = self.ealloc.allocate();
        self.buffer.push(Box::new(AddEntity { entity, components }));
        entity
    }

    /// Records the removal of every component of `entity`.
    ///
    /// See [`World::remove_entity`] for the meaning of `cascade`.
    pub fn remove_entity(&self, entity: Entity, cascade: bool) {
        self.buffer.push(Box::new(RemoveEntity { entity, cascade }));
    }

    /// Records the insertion of a `C` value for `entity`.
    pub fn add_component<C: Component>(&self, entity: Entity, value: C) {
        self.buffer.push(Box::new(AddComponent { entity, value }));
    }

    /// Records the removal of the `C` value of `entity`.
    pub fn remove_component<C: Component>(&self, entity: Entity) {
        self.buffer.push(Box::new(RemoveComponent::<C> { entity, _ph: PhantomData }));
    }

    /// Records the instantiation of `template` into the world.
    ///
    /// `then` runs immediately after the copy with the remap table,
    /// typically to fix up entity references with
    /// [`World::remap_component`] or to adjust the copied values.
    pub fn instantiate(
        &self,
        template: Arc<World>,
        then: impl FnOnce(&mut World, &Remap) + Send + 'static,
    ) {
        self.buffer.push(Box::new(Instantiate { template, then }));
    }

    /// Records a closure to run with exclusive access to the world.
    ///
    /// The closure may use any direct mutation method of the world,
    /// except [`World::execute_commands`].
    /// Commands it records are executed in the next drain.
    pub fn defer(&self, f: impl FnOnce(&mut World) + Send + 'static) {
        self.buffer.push(Box::new(Defer(f)));
    }
}
