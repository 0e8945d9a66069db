use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::planner::StealResult;
use super::{Planner, Topology};
use crate::system::SystemId;
use crate::tracer::{self, Tracer};

pub(crate) struct Executor {
    thread_pool: Option<rayon::ThreadPool>,
    concurrency: usize,
}

impl Executor {
    /// Builds a new executor with the given `concurrency`.
    ///
    /// Note that `concurrency` only specifies the number of worker threads.
    /// The main thread is not considered a worker thread,
    /// but it executes systems as well.
    /// Therefore, it is valid to set a concurrency of 0,
    /// especially in environments where threading is not supported.
    pub(crate) fn new(concurrency: usize) -> Self {
        Self {
            thread_pool: (concurrency > 0).then(|| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(concurrency)
                    .thread_name(|i| format!("pagec executor #{i}"))
                    .build()
                    .expect("Failed to create thread pool")
            }),
            concurrency,
        }
    }

    pub(crate) fn concurrency(&self) -> usize { self.concurrency }

    pub(crate) fn execute_full_cycle(
        &self,
        tracer: &impl Tracer,
        topology: &Topology,
        planner: &mut Mutex<Planner>,
        names: &[String],
        run_system: &(impl Fn(tracer::Thread, SystemId, &str) + Sync),
    ) {
        let condvar = Condvar::new();

        planner.get_mut().clone_from(topology.initial_planner());

        tracer.start_cycle();

        for &system in &planner.get_mut().runnable {
            tracer.mark_runnable(system);
        }

        let deadlock_counter = DeadlockCounter::new(self.concurrency + 1);
        let panic_payload = Mutex::new(None);

        let context = Context {
            topology,
            planner: &*planner,
            condvar: &condvar,
            names,
            deadlock_counter: &deadlock_counter,
            panic_payload: &panic_payload,
        };

        if let Some(pool) = &self.thread_pool {
            pool.in_place_scope(|scope| {
                for worker_id in 0..self.concurrency {
                    scope.spawn(move |_| {
                        worker(tracer::Thread::Worker(worker_id), tracer, context, run_system)
                    });
                }

                worker(tracer::Thread::Main, tracer, context, run_system);
            });
        } else {
            worker(tracer::Thread::Main, tracer, context, run_system);
        }

        if let Some(payload) = panic_payload.into_inner() {
            panic::resume_unwind(payload);
        }

        #[cfg(debug_assertions)]
        {
            use super::WakeupState;

            for (system, state) in &planner.get_mut().wakeup_state {
                let is_complete = matches!(state, WakeupState::Completed);
                if !is_complete {
                    panic!("{system:?} state is {state:?} instead of complete")
                }
            }
        }

        tracer.end_cycle();
    }
}

/// Steals and runs systems until every system in the cycle has completed.
fn worker(
    thread: tracer::Thread,
    tracer: &impl Tracer,
    context: Context<'_>,
    run_system: &impl Fn(tracer::Thread, SystemId, &str),
) {
    let mut planner_guard = context.planner.lock();

    loop {
        match planner_guard.steal(tracer, thread, context.topology) {
            StealResult::CycleComplete => return,
            StealResult::Pending => {
                context.deadlock_counter.start_wait();
                context.condvar.wait(&mut planner_guard);
            }
            StealResult::Ready(system) => {
                let debug_name = context.names.get(system.0).expect("invalid system id");

                let result = MutexGuard::unlocked(&mut planner_guard, || {
                    tracer.start_run_system(thread, system, debug_name);
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        run_system(thread, system, debug_name);
                    }));
                    tracer.end_run_system(thread, system, debug_name);
                    result
                });

                if let Err(payload) = result {
                    log::error!("{debug_name} ({system:?}) panicked, aborting the cycle");
                    context.panic_payload.lock().get_or_insert(payload);
                    planner_guard.abort(context.condvar, context.deadlock_counter);
                    return;
                }

                planner_guard.complete(
                    tracer,
                    system,
                    context.topology,
                    context.condvar,
                    context.deadlock_counter,
                );
            }
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(debug_assertions)] {
        use std::sync::atomic::{self, AtomicUsize};

        /// Counts the threads that are not waiting on the condvar.
        pub(crate) struct DeadlockCounter(AtomicUsize);

        impl DeadlockCounter {
            pub(crate) fn new(threads: usize) -> Self { Self(AtomicUsize::new(threads)) }

            pub(crate) fn start_wait(&self) {
                let cnt = self.0.fetch_sub(1, atomic::Ordering::SeqCst);
                if cnt == 1 {
                    panic!("Deadlock detected, all workers and main are waiting for systems");
                }
            }

            pub(crate) fn end_wait(&self, count: usize) {
                self.0.fetch_add(count, atomic::Ordering::SeqCst);
            }
        }
    } else {
        pub(crate) struct DeadlockCounter;

        impl DeadlockCounter {
            pub(crate) fn new(_threads: usize) -> Self { Self }
            pub(crate) fn start_wait(&self) {}
            pub(crate) fn end_wait(&self, _count: usize) {}
        }
    }
}

#[derive(Clone, Copy)]
struct Context<'t> {
    topology:         &'t Topology,
    planner:          &'t Mutex<Planner>,
    condvar:          &'t Condvar,
    names:            &'t [String],
    deadlock_counter: &'t DeadlockCounter,
    /// The first panic raised by a system in this cycle.
    panic_payload:    &'t Mutex<Option<Box<dyn Any + Send>>>,
}
