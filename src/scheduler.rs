//! The scheduler manages the execution of systems,
//! including resource negotiation and dependency constraints.

use std::collections::{hash_map, HashMap};
use std::num::NonZeroUsize;

use parking_lot::Mutex;

use crate::system::SystemId;
use crate::tracer::{self, Tracer};
use crate::util::DbgTypeId;

mod executor;
use executor::Executor;

mod planner;
use planner::Planner;

mod topology;
use topology::Topology;


/// Schedules the systems of a [`SystemSet`](crate::SystemSet).
///
/// The topology is derived lazily from the registered systems, orders and resources,
/// and is rebuilt on the next cycle whenever any of them changes.
pub(crate) struct Scheduler {
    names:     Vec<String>,
    resources: HashMap<DbgTypeId, HashMap<SystemId, Vec<ResourceAccess>>>,
    orders:    Vec<Order>,
    topology:  Option<Topology>,
    planner:   Mutex<Planner>,
    executor:  Executor,
}

impl Scheduler {
    pub(crate) fn new(concurrency: usize) -> Self {
        Self {
            names:     Vec::new(),
            resources: HashMap::new(),
            orders:    Vec::new(),
            topology:  None,
            planner:   Mutex::new(Planner::default()),
            executor:  Executor::new(concurrency),
        }
    }

    /// Returns the number of worker threads, not counting the main thread.
    pub(crate) fn concurrency(&self) -> usize { self.executor.concurrency() }

    pub(crate) fn name(&self, system: SystemId) -> &str {
        match self.names.get(system.0) {
            Some(name) => name,
            None => panic!("Unknown system {system:?}"),
        }
    }

    /// Allocates a node for a new system.
    pub(crate) fn push_system(&mut self, name: String) -> SystemId {
        let system = SystemId(self.names.len());
        self.names.push(name);
        self.topology = None;
        system
    }

    /// Declares that `system` accesses the resource `ty`.
    ///
    /// # Panics
    /// Panics if `system` has already declared an access to `ty` that conflicts with `access`.
    pub(crate) fn use_resource(&mut self, system: SystemId, ty: DbgTypeId, access: ResourceAccess) {
        match self.resources.entry(ty).or_default().entry(system) {
            hash_map::Entry::Vacant(entry) => {
                entry.insert(vec![access]);
            }
            hash_map::Entry::Occupied(mut entry) => {
                for other in entry.get() {
                    if let Err(err) = access.check_conflicts_with(other) {
                        panic!(
                            "Cannot schedule {} due to conflicts in {ty} access: {err}",
                            describe(&self.names, system),
                        );
                    }
                }
                entry.get_mut().push(access);
            }
        }
        self.topology = None;
    }

    /// Requires `order.after` to start after `order.before` completes.
    ///
    /// # Panics
    /// Panics if either system is unknown.
    pub(crate) fn add_order(&mut self, order: Order) {
        for system in [order.before, order.after] {
            assert!(system.0 < self.names.len(), "Unknown system {system:?}");
        }
        self.orders.push(order);
        self.topology = None;
    }

    /// Runs every system exactly once.
    ///
    /// `run_system` is called from the main thread or a worker thread for each system,
    /// together with the name of the system.
    ///
    /// # Panics
    /// Panics if the dependencies between systems form a cycle.
    pub(crate) fn execute(
        &mut self,
        tracer: &impl Tracer,
        run_system: &(impl Fn(tracer::Thread, SystemId, &str) + Sync),
    ) {
        let Self { names, resources, orders, topology, planner, executor } = self;

        let topology = topology.get_or_insert_with(|| {
            log::debug!(
                "Building schedule for {} systems with {} orders",
                names.len(),
                orders.len()
            );
            Topology::init(names.len(), orders, resources, |system| describe(names, system))
        });

        executor.execute_full_cycle(tracer, topology, planner, names, run_system);
    }
}

fn describe(names: &[String], system: SystemId) -> String {
    match names.get(system.0) {
        Some(name) => format!("{name} ({system:?})"),
        None => format!("{system:?}"),
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum WakeupState {
    /// The system is runnable after being awaken by `count` other systems.
    Blocked { count: NonZeroUsize },
    /// The system is in the planner queue.
    Pending,
    /// The system is scheduled on one of the threads.
    Started,
    /// The system has already completed.
    Completed,
}

/// Requests access to a component table.
#[derive(Debug)]
pub(crate) struct ResourceAccess {
    mutable: bool,
}

impl ResourceAccess {
    pub(crate) fn new(mutable: bool) -> Self { Self { mutable } }

    fn check_conflicts_with(&self, other: &Self) -> Result<(), String> {
        match (self.mutable, other.mutable) {
            (false, false) => Ok(()),
            (true, true) => {
                Err("unique access is requested twice in the same system".to_string())
            }
            _ => Err("unique access is requested but shared access is requested again in the \
                      same system"
                .to_string()),
        }
    }
}

/// A dependency edge between two systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Order {
    pub(crate) before: SystemId,
    pub(crate) after:  SystemId,
}
