use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Blocks until `saturation` threads are waiting at the same time.
///
/// Used to prove that multiple systems can run concurrently:
/// if the scheduler serialized them, the first waiter would time out.
#[derive(Debug)]
pub struct AntiSemaphore {
    saturation: usize,
    timeout:    Duration,
    lock:       Mutex<Round>,
    condvar:    Condvar,
}

#[derive(Debug)]
struct Round {
    waiting:    usize,
    /// Incremented every time the semaphore saturates.
    generation: usize,
}

impl AntiSemaphore {
    /// Creates a semaphore that releases its waiters once `saturation` threads arrive.
    pub fn new(saturation: usize) -> Self { Self::with_timeout(saturation, Duration::from_secs(5)) }

    /// Creates a semaphore that panics if it is not saturated within `timeout`.
    pub fn with_timeout(saturation: usize, timeout: Duration) -> Self {
        Self {
            saturation,
            timeout,
            lock: Mutex::new(Round { waiting: 0, generation: 0 }),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until the semaphore is saturated.
    ///
    /// # Panics
    /// Panics if the semaphore is not saturated within the timeout.
    pub fn wait(&self) {
        let mut round = self.lock.lock();
        log::trace!(
            "AntiSemaphore(waiting: {}, saturation: {}).wait()",
            round.waiting,
            self.saturation
        );
        round.waiting += 1;
        assert!(round.waiting <= self.saturation, "AntiSemaphore exceeded saturation");

        if round.waiting == self.saturation {
            round.waiting = 0;
            round.generation += 1;
            self.condvar.notify_all();
            return;
        }

        let generation = round.generation;
        while round.generation == generation {
            if self.condvar.wait_for(&mut round, self.timeout).timed_out() {
                panic!(
                    "Deadlock: AntiSemaphore not saturated for more than {:?}",
                    self.timeout
                );
            }
        }
    }
}
