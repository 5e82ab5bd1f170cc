//! The scheduler: a task queue gated by the simulated clock.
//!
//! # Liveness contract
//!
//! [`Scheduler::wait_for_next`] never dispatches early — a task with a
//! positive due time is handed out only once the committed simulated
//! time has reached it — and never lets simulated time run past a
//! pending due task, because every commit is clamped by the earliest
//! positive due time in the queue.
//!
//! The wait itself is a sleep-then-reassess loop: the real-time delay
//! to the head's due time is computed from a consistent clock sample,
//! and every wake (timeout, queue mutation, clock control) re-evaluates
//! from scratch, since the head may have changed while sleeping.

use std::time::Duration;

use trundle_core::id::{ClientId, InterlockToken, TaskId};
use trundle_core::time::SimTime;

use crate::clock::SimClock;
use crate::queue::TaskQueue;
use crate::task::TaskEntry;

/// A [`TaskQueue`] extended with a simulated clock, speed control, and
/// the interlock handshake.
pub struct Scheduler {
    queue: TaskQueue,
    clock: SimClock,
}

impl Scheduler {
    /// Create a scheduler with a stopped clock at simulated time zero.
    pub fn new(speed: f64) -> Self {
        Self {
            queue: TaskQueue::new(),
            clock: SimClock::new(speed),
        }
    }

    // ── queue surface ──────────────────────────────────────────

    /// Insert a task. See [`TaskQueue::add`].
    pub fn add(&self, entry: TaskEntry) -> Result<(), TaskEntry> {
        self.queue.add(entry)
    }

    /// Remove a task by id. See [`TaskQueue::remove`].
    pub fn remove(&self, id: TaskId) -> Option<TaskEntry> {
        self.queue.remove(id)
    }

    /// Bulk-cancel a client's tasks. See [`TaskQueue::remove_by_originator`].
    pub fn remove_by_originator(&self, originator: ClientId) -> usize {
        self.queue.remove_by_originator(originator)
    }

    /// O(1) membership check.
    pub fn is_member(&self, id: TaskId) -> bool {
        self.queue.is_member(id)
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Close the queue and release every waiter. Used at shutdown.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Whether the scheduler has been closed.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    // ── clock surface ──────────────────────────────────────────

    /// Commit and return the current simulated time, clamped so it
    /// never exceeds the earliest pending positive due time.
    pub fn now(&self) -> SimTime {
        self.clock.commit(self.queue.earliest_positive_due())
    }

    /// Start the clock. Wakes the drain loop: the head's real-time
    /// deadline just changed.
    pub fn start_clock(&self) {
        self.clock.start();
        self.queue.notify();
    }

    /// Stop the clock, committing the estimated time first.
    pub fn stop_clock(&self) {
        self.clock.stop(self.queue.earliest_positive_due());
        self.queue.notify();
    }

    /// Change the clock speed (stop, change, restart, preserving
    /// continuity). Returns `false` and leaves the speed untouched for
    /// an invalid value.
    pub fn set_speed(&self, speed: f64) -> bool {
        let accepted = self
            .clock
            .set_speed(speed, self.queue.earliest_positive_due());
        if accepted {
            self.queue.notify();
        }
        accepted
    }

    /// Current clock speed.
    pub fn speed(&self) -> f64 {
        self.clock.speed()
    }

    /// Whether the clock is running.
    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Freeze simulated time and obtain a token for resuming it.
    /// Last-opened-wins: see [`SimClock::open_interlock`].
    pub fn open_interlock(&self) -> InterlockToken {
        let token = self
            .clock
            .open_interlock(self.queue.earliest_positive_due());
        self.queue.notify();
        token
    }

    /// Resume the clock if `token` is current. Stale tokens are
    /// ignored.
    pub fn close_interlock(&self, token: InterlockToken) -> bool {
        let resumed = self.clock.close_interlock(token);
        if resumed {
            self.queue.notify();
        }
        resumed
    }

    // ── dispatch ───────────────────────────────────────────────

    /// Block until the head task is due, then remove and return it.
    /// Returns `None` once the scheduler is closed.
    ///
    /// A head with `due <= 0` (or at-or-before the committed time)
    /// dispatches immediately. Otherwise the loop sleeps for
    /// `(due - estimate) / speed` real seconds — or indefinitely while
    /// the clock is stopped — and re-evaluates from scratch on every
    /// wake.
    pub fn wait_for_next(&self) -> Option<TaskEntry> {
        loop {
            if self.queue.is_closed() {
                return None;
            }

            // Stamp first: a mutation landing between the peek below
            // and the wait must not be slept through.
            let stamp = self.queue.change_stamp();

            let now = self.now();
            if let Some(entry) = self.queue.pop_due(now) {
                return Some(entry);
            }

            let timeout = match self.queue.head_due() {
                // Empty queue: sleep until something is added.
                None => None,
                Some(due) => {
                    let clock = self.clock.sample();
                    if !clock.running {
                        // Frozen clock: a timed task cannot come due
                        // until the clock is restarted, which notifies.
                        None
                    } else {
                        // Capped: a far-future due time sleeps in hour
                        // slices and re-evaluates, rather than feeding
                        // an unbounded float into Duration.
                        let real_secs =
                            ((due.as_secs() - clock.estimate) / clock.speed).clamp(0.0, 3600.0);
                        Some(Duration::from_secs_f64(real_secs))
                    }
                }
            };

            self.queue.wait_for_change_since(stamp, timeout);
        }
    }
}
