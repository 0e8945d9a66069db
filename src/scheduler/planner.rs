use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;

use parking_lot::Condvar;

use super::executor::DeadlockCounter;
use super::{Topology, WakeupState};
use crate::system::SystemId;
use crate::tracer::{self, Tracer};

/// Stores the cycle-local state for schedule availability.
#[derive(Debug, Clone, Default)]
pub(crate) struct Planner {
    /// Stores the number of systems blocking each system from getting scheduled.
    /// Started systems remain in the map until they are completed.
    /// Pending systems may become blocked again if an exclusive system starts.
    pub(crate) wakeup_state: HashMap<SystemId, WakeupState>,

    /// The systems in [`WakeupState::Pending`], in the order they are stolen.
    pub(crate) runnable: BTreeSet<SystemId>,

    /// Number of systems that have not completed yet.
    pub(crate) remaining_systems: usize,

    /// Whether a system panicked in this cycle.
    /// No more systems are stolen once this is set.
    pub(crate) aborted: bool,
}

impl Planner {
    /// Steals a system from the runnable pool if any is available.
    pub(crate) fn steal(
        &mut self,
        tracer: &impl Tracer,
        thread: tracer::Thread,
        topology: &Topology,
    ) -> StealResult {
        if self.remaining_systems == 0 || self.aborted {
            tracer.steal_return_complete(thread);
            return StealResult::CycleComplete;
        }

        let system = match self.runnable.pop_first() {
            Some(system) => system,
            None => {
                tracer.steal_return_pending(thread);
                return StealResult::Pending;
            }
        };

        {
            let state = self.wakeup_state.get_mut(&system).expect("invalid system id");
            match state {
                WakeupState::Pending => *state = WakeupState::Started,
                _ => panic!("{system:?} is in runnable queue but state is {state:?}"),
            }
        }

        // starting a system has no effect on its dependencies and dependents

        for &excl in topology.exclusions_of(system) {
            let state = self.wakeup_state.get_mut(&excl).expect("invalid system id");
            match state {
                WakeupState::Pending => {
                    *state = WakeupState::Blocked { count: NonZeroUsize::MIN };
                    let removed = self.runnable.remove(&excl);
                    assert!(removed, "Pending system {excl:?} should be in runnable pool");
                    tracer.unmark_runnable(excl);
                }
                WakeupState::Blocked { count } => {
                    *count = count.checked_add(1).expect("integer overflow");
                }
                WakeupState::Started => {
                    panic!("{excl:?} started concurrently with exclusive system {system:?}")
                }
                WakeupState::Completed => {}
            }
        }

        StealResult::Ready(system)
    }

    /// Marks a started system as completed and wakes up the waiting threads.
    pub(crate) fn complete(
        &mut self,
        tracer: &impl Tracer,
        system: SystemId,
        topology: &Topology,
        condvar: &Condvar,
        deadlock_counter: &DeadlockCounter,
    ) {
        {
            let state = self.wakeup_state.get_mut(&system).expect("invalid system id");
            match state {
                WakeupState::Started => *state = WakeupState::Completed,
                _ => panic!("cannot mark a {state:?} system as completed"),
            }
        }

        let blocked = topology.dependents_of(system).iter().chain(topology.exclusions_of(system));
        for &blocked in blocked {
            self.remove_one_block(tracer, blocked);
        }

        self.remaining_systems -= 1;

        tracer.complete_system(system, self.remaining_systems);

        let wakeups = condvar.notify_all();
        deadlock_counter.end_wait(wakeups);
    }

    /// Stops the cycle after a system panicked and wakes up the waiting threads,
    /// so that every thread returns once its running system completes.
    pub(crate) fn abort(&mut self, condvar: &Condvar, deadlock_counter: &DeadlockCounter) {
        self.aborted = true;

        let wakeups = condvar.notify_all();
        deadlock_counter.end_wait(wakeups);
    }

    /// Removes one blocker from the wakeup state of `system`.
    fn remove_one_block(&mut self, tracer: &impl Tracer, system: SystemId) {
        let state = self.wakeup_state.get_mut(&system).expect("invalid system id");
        match state {
            WakeupState::Blocked { count } => match NonZeroUsize::new(count.get() - 1) {
                Some(decremented) => *count = decremented,
                None => {
                    *state = WakeupState::Pending;
                    let new = self.runnable.insert(system);
                    assert!(new, "Blocked system {system:?} is already in runnable pool");
                    tracer.mark_runnable(system);
                }
            },
            WakeupState::Completed => {} // no exclusion for completed systems
            state => {
                panic!("{system:?} is in state {state:?} which should not have blockers")
            }
        }
    }
}

#[derive(Debug)]
pub(crate) enum StealResult {
    Ready(SystemId),
    Pending,
    CycleComplete,
}
