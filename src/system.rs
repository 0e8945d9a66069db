//! Systems are callbacks run once per dispatch over cached queries.
//!
//! A system is registered in two steps.
//! The registration closure runs once with a [`Registrar`],
//! which creates the queries the system uses and declares their accesses to the scheduler.
//! It returns the system body, which runs on every [`SystemSet::run`]
//! and receives a [`Run`] with the shared context and the world.
//!
//! ```
//! use pagec::query::{Read, Write};
//! use pagec::system::{Run, SystemSet};
//! use pagec::World;
//!
//! #[derive(Clone)]
//! struct Position(f32);
//! #[derive(Clone)]
//! struct Velocity(f32);
//!
//! struct Frame {
//!     delta: f32,
//! }
//!
//! let mut world = World::new();
//! let entity = world.add_entity((Position(0.0), Velocity(2.0)));
//!
//! let mut systems = SystemSet::<Frame>::new();
//! systems.add_system(&mut world, "movement", |reg| {
//!     let query = reg.query::<(Write<Position>, Read<Velocity>)>();
//!     move |run: &Run<'_, Frame>| {
//!         let delta = run.context().delta;
//!         run.view(&query).for_each(|_, (position, velocity)| position.0 += velocity.0 * delta);
//!     }
//! });
//!
//! world.update_queries();
//! systems.run(&world, &Frame { delta: 0.5 });
//! world.execute_commands();
//! world.clean_up_pages();
//!
//! assert_eq!(world.get::<Position>(entity).map(|position| position.0), Some(1.0));
//! ```

use parking_lot::Mutex;

use crate::command::Commands;
use crate::query::{Query, Shape, View};
use crate::scheduler::{Order, ResourceAccess, Scheduler};
use crate::tracer::{self, Tracer};
use crate::World;

#[cfg(test)]
mod tests;

/// Identifies a system in its [`SystemSet`].
///
/// IDs are assigned in registration order starting from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(pub(crate) usize);

impl SystemId {
    /// Returns the registration index of the system.
    pub fn index(self) -> usize { self.0 }
}

type BoxedSystem<Ctx> = Box<dyn FnMut(&Run<'_, Ctx>) + Send>;

/// A set of systems dispatched together, sharing one context value of type `Ctx`.
///
/// Systems without a dependency path between them may run concurrently,
/// unless one of them writes a component type that the other reads or writes.
pub struct SystemSet<Ctx = ()> {
    scheduler: Scheduler,
    systems:   Vec<Mutex<BoxedSystem<Ctx>>>,
}

impl<Ctx: Sync + 'static> Default for SystemSet<Ctx> {
    fn default() -> Self { Self::new() }
}

impl<Ctx: Sync + 'static> SystemSet<Ctx> {
    /// Creates a system set with one worker thread per available CPU.
    pub fn new() -> Self {
        Self::with_concurrency(match std::thread::available_parallelism() {
            Ok(c) => c.get(),
            Err(err) => {
                log::error!("Cannot detect number of CPUs ({err}), parallelism disabled");
                0
            }
        })
    }

    /// Creates a system set that runs every system on the calling thread.
    pub fn unthreaded() -> Self { Self::with_concurrency(0) }

    /// Creates a system set with `concurrency` worker threads.
    ///
    /// The thread calling [`run`](Self::run) executes systems too,
    /// so `concurrency` may be 0.
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self { scheduler: Scheduler::new(concurrency), systems: Vec::new() }
    }

    /// Returns the number of worker threads, not counting the calling thread.
    pub fn concurrency(&self) -> usize { self.scheduler.concurrency() }

    /// Returns the number of systems in this set.
    pub fn len(&self) -> usize { self.systems.len() }

    /// Returns whether this set has no systems.
    pub fn is_empty(&self) -> bool { self.systems.is_empty() }

    /// Returns the name of a system.
    ///
    /// # Panics
    /// Panics if `system` does not belong to this set.
    pub fn name(&self, system: SystemId) -> &str { self.scheduler.name(system) }

    /// Registers a system.
    ///
    /// `register` is called immediately to create the queries of the system in `world`.
    /// The closure it returns is the system body.
    ///
    /// # Panics
    /// Panics if the system requests unique access to a component type
    /// that it also requests elsewhere.
    pub fn add_system<S>(
        &mut self,
        world: &mut World,
        name: impl Into<String>,
        register: impl FnOnce(&mut Registrar<'_>) -> S,
    ) -> SystemId
    where
        S: FnMut(&Run<'_, Ctx>) + Send + 'static,
    {
        let system = self.scheduler.push_system(name.into());
        let body = register(&mut Registrar { world, scheduler: &mut self.scheduler, system });
        self.systems.push(Mutex::new(Box::new(body)));
        system
    }

    /// Requires `after` to start only after `before` has completed in every run.
    ///
    /// # Panics
    /// Panics if either system does not belong to this set.
    /// [`run`](Self::run) panics if dependencies form a cycle.
    pub fn add_dependency(&mut self, before: SystemId, after: SystemId) {
        self.scheduler.add_order(Order { before, after });
    }

    /// Orders `systems` to run one after another in the given sequence.
    pub fn add_chain(&mut self, systems: &[SystemId]) {
        for pair in systems.windows(2) {
            if let &[before, after] = pair {
                self.add_dependency(before, after);
            }
        }
    }

    /// Runs every system exactly once and blocks until all of them have completed.
    ///
    /// Must not overlap [`World::update_queries`] or [`World::execute_commands`],
    /// which require unique access to the world anyway.
    ///
    /// # Panics
    /// If a system panics, no further systems are started in this run,
    /// and the panic is resumed once the running systems have returned.
    pub fn run(&mut self, world: &World, context: &Ctx) {
        self.run_traced(world, context, &tracer::Noop)
    }

    /// Same as [`run`](Self::run), reporting scheduler events to `tracer`.
    pub fn run_traced(&mut self, world: &World, context: &Ctx, tracer: &impl Tracer) {
        let Self { scheduler, systems } = self;

        scheduler.execute(tracer, &|thread, system: SystemId, name: &str| {
            let mut body = systems
                .get(system.0)
                .expect("invalid system id")
                .try_lock()
                .expect("system should only be scheduled to one worker");
            (*body)(&Run { world, context, thread, system, name });
        });
    }
}

/// Declares the queries of a system being registered.
pub struct Registrar<'a> {
    world:     &'a mut World,
    scheduler: &'a mut Scheduler,
    system:    SystemId,
}

impl Registrar<'_> {
    /// Returns the ID of the system being registered.
    pub fn id(&self) -> SystemId { self.system }

    /// Creates the query `Q` in the world and declares its accesses.
    ///
    /// # Panics
    /// Panics if the accesses of `Q` conflict with accesses already declared by this system.
    pub fn query<Q: Shape>(&mut self) -> Query<Q> {
        for column in Q::columns() {
            self.scheduler.use_resource(
                self.system,
                column.ty,
                ResourceAccess::new(column.mode.is_mutable()),
            );
        }
        self.world.query::<Q>()
    }

    /// Returns the world the system is registered in.
    ///
    /// Useful for populating initial entities while registering.
    pub fn world(&mut self) -> &mut World { self.world }
}

/// The arguments passed to a system body in one dispatch.
pub struct Run<'w, Ctx> {
    world:   &'w World,
    context: &'w Ctx,
    thread:  tracer::Thread,
    system:  SystemId,
    name:    &'w str,
}

impl<'w, Ctx> Run<'w, Ctx> {
    /// Returns the context value shared by every system in this dispatch.
    pub fn context(&self) -> &'w Ctx { self.context }

    /// Returns the world being dispatched.
    ///
    /// Direct reads with [`World::get`] panic
    /// if another system is writing to the same table concurrently.
    pub fn world(&self) -> &'w World { self.world }

    /// Locks the tables of `query` for this system.
    pub fn view<Q: Shape>(&self, query: &Query<Q>) -> View<'w, Q> { query.view(self.world) }

    /// Returns a handle to record structural changes.
    pub fn commands(&self) -> Commands<'w> { self.world.commands() }

    /// Returns the thread executing the system.
    pub fn thread(&self) -> tracer::Thread { self.thread }

    /// Returns the ID of the running system.
    pub fn id(&self) -> SystemId { self.system }

    /// Returns the name of the running system.
    pub fn name(&self) -> &'w str { self.name }
}
