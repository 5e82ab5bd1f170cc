//! The ordered task queue: the synchronization boundary for all
//! producers.
//!
//! # Ordering
//!
//! At every observable point the queue is sorted by the composite key
//! `(due asc, priority desc, insertion seq asc)`. Insertion keeps the
//! order by a linear scan from the head — queue depths are small (a few
//! tasks per connected client) and the scan runs under the same lock
//! an ordered structure would need anyway.
//!
//! # Concurrency
//!
//! One internal lock guards the whole queue; `add`/`remove`/membership
//! checks are mutually exclusive, and the blocking waits are released
//! by any mutation of the same queue. A mutation stamp lets callers
//! sleep without losing wakeups that land between a peek and the wait.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use tracing::{debug, warn};
use trundle_core::id::{ClientId, TaskId};
use trundle_core::time::SimTime;

use crate::task::TaskEntry;

struct Inner {
    /// Sorted entries; index 0 is the head.
    entries: Vec<TaskEntry>,
    /// Membership by task id, making double-add detection O(1). A task
    /// belongs to at most one queue at a time.
    members: HashSet<TaskId>,
    /// Source of insertion sequence numbers.
    next_seq: u64,
    /// Bumped on every mutation; used by [`TaskQueue::wait_for_change_since`].
    mutations: u64,
    /// Once closed, adds are rejected and waiters drain out.
    closed: bool,
}

/// An ordered collection of tasks with blocking hand-off.
pub struct TaskQueue {
    inner: Mutex<Inner>,
    cond: Condvar,
}

// Compile-time assertion: TaskQueue must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<TaskQueue>();
};

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                members: HashSet::new(),
                next_seq: 0,
                mutations: 0,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Insert a task at the position preserving the ordering invariant.
    ///
    /// Adding a task that is already a member is a defensive no-op: the
    /// entry is handed back, the queue is unchanged, and the misuse is
    /// logged as a warning rather than treated as a crash. Adds to a
    /// closed queue are handed back likewise.
    pub fn add(&self, mut entry: TaskEntry) -> Result<(), TaskEntry> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            debug!(task = %entry.id, "add on closed queue rejected");
            return Err(entry);
        }
        if inner.members.contains(&entry.id) {
            warn!(task = %entry.id, "add ignored: task is already a queue member");
            return Err(entry);
        }
        entry.seq = inner.next_seq;
        inner.next_seq += 1;
        let pos = insert_pos(&inner.entries, &entry);
        inner.members.insert(entry.id);
        inner.entries.insert(pos, entry);
        inner.mutations += 1;
        self.cond.notify_all();
        Ok(())
    }

    /// Remove a task by id. Absent tasks are a no-op (`None`); the
    /// membership flag is always clear afterwards either way.
    pub fn remove(&self, id: TaskId) -> Option<TaskEntry> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.members.remove(&id) {
            debug!(task = %id, "remove ignored: task is not a queue member");
            return None;
        }
        let pos = inner
            .entries
            .iter()
            .position(|e| e.id == id)
            .expect("membership set out of sync with entries");
        let entry = inner.entries.remove(pos);
        inner.mutations += 1;
        self.cond.notify_all();
        Some(entry)
    }

    /// Bulk-cancel every member task owned by `originator`. Returns the
    /// number of tasks removed. Used when a client disconnects.
    pub fn remove_by_originator(&self, originator: ClientId) -> usize {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let before = inner.entries.len();
        let members = &mut inner.members;
        // Vec::retain preserves the relative order of survivors, so the
        // ordering invariant is untouched.
        inner.entries.retain(|e| {
            if e.originator == Some(originator) {
                members.remove(&e.id);
                false
            } else {
                true
            }
        });
        let removed = before - inner.entries.len();
        if removed > 0 {
            inner.mutations += 1;
            self.cond.notify_all();
        }
        removed
    }

    /// O(1) membership check.
    pub fn is_member(&self, id: TaskId) -> bool {
        self.inner.lock().unwrap().members.contains(&id)
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().entries.is_empty()
    }

    /// Due time of the head task, if any.
    pub fn head_due(&self) -> Option<SimTime> {
        self.inner.lock().unwrap().entries.first().map(|e| e.due)
    }

    /// Due time of the earliest pending task with a positive due time.
    /// This is the clamp the scheduler's clock must never run past.
    pub fn earliest_positive_due(&self) -> Option<SimTime> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .find(|e| !e.due.is_immediate())
            .map(|e| e.due)
    }

    /// Pop the head task if it is due: immediately dispatchable
    /// (`due <= 0`) or due at-or-before `now`.
    pub fn pop_due(&self, now: SimTime) -> Option<TaskEntry> {
        let mut inner = self.inner.lock().unwrap();
        let head_ready = inner
            .entries
            .first()
            .map(|e| e.due.is_immediate() || e.due <= now)
            .unwrap_or(false);
        if !head_ready {
            return None;
        }
        let entry = inner.entries.remove(0);
        inner.members.remove(&entry.id);
        inner.mutations += 1;
        self.cond.notify_all();
        Some(entry)
    }

    /// Block until the queue is non-empty, then atomically remove and
    /// return the head. Returns `None` once the queue is closed.
    ///
    /// This is the plain hand-off without clock gating; the scheduler
    /// layers the simulated-time contract on top.
    pub fn wait_for_next(&self) -> Option<TaskEntry> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.closed {
                return None;
            }
            if !inner.entries.is_empty() {
                let entry = inner.entries.remove(0);
                inner.members.remove(&entry.id);
                inner.mutations += 1;
                self.cond.notify_all();
                return Some(entry);
            }
            inner = self.cond.wait(inner).unwrap();
        }
    }

    /// The current mutation stamp. Capture before deciding to sleep,
    /// then pass to [`wait_for_change_since`](Self::wait_for_change_since)
    /// so a mutation in between is never slept through.
    pub fn change_stamp(&self) -> u64 {
        self.inner.lock().unwrap().mutations
    }

    /// Wait until the queue mutates past `stamp`, the queue closes, or
    /// the timeout elapses (`None` = wait indefinitely). Returns `true`
    /// if a change or close was observed.
    pub fn wait_for_change_since(&self, stamp: u64, timeout: Option<Duration>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let deadline = timeout.map(|t| std::time::Instant::now() + t);
        loop {
            if inner.closed || inner.mutations != stamp {
                return true;
            }
            match deadline {
                None => inner = self.cond.wait(inner).unwrap(),
                Some(d) => {
                    let now = std::time::Instant::now();
                    if now >= d {
                        return false;
                    }
                    let (guard, _timeout) = self.cond.wait_timeout(inner, d - now).unwrap();
                    inner = guard;
                }
            }
        }
    }

    /// Nudge waiters without mutating the entries (used when the clock
    /// starts, stops, or changes speed — the head's real-time deadline
    /// moved even though the queue did not).
    pub fn notify(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.mutations += 1;
        self.cond.notify_all();
    }

    /// Close the queue: reject further adds and wake every waiter
    /// permanently.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.mutations += 1;
        self.cond.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Snapshot of `(id, due, priority)` triples in queue order, for
    /// tests and diagnostics.
    pub fn order_snapshot(&self) -> Vec<(TaskId, SimTime, i32)> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|e| (e.id, e.due, e.priority))
            .collect()
    }
}

/// First index whose entry should dispatch after `entry`, i.e. the
/// insertion point preserving `(due asc, priority desc, seq asc)`.
fn insert_pos(entries: &[TaskEntry], entry: &TaskEntry) -> usize {
    entries
        .iter()
        .position(|existing| dispatches_after(existing, entry))
        .unwrap_or(entries.len())
}

/// Whether `a` dispatches after `b` under the ordering invariant.
fn dispatches_after(a: &TaskEntry, b: &TaskEntry) -> bool {
    if a.due != b.due {
        return a.due > b.due;
    }
    if a.priority != b.priority {
        return a.priority < b.priority;
    }
    a.seq > b.seq
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use trundle_core::id::ClientId;

    use crate::session::TaskContext;
    use crate::task::{Recurrence, Task};

    struct Noop;

    impl Task for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }
        fn process(&mut self, _ctx: &mut TaskContext<'_>) -> Recurrence {
            Recurrence::Done
        }
    }

    fn entry(id: u64, due: f64, priority: i32) -> TaskEntry {
        TaskEntry::new(
            TaskId(id),
            SimTime::from_secs(due),
            priority,
            None,
            Box::new(Noop),
        )
    }

    fn entry_for(id: u64, due: f64, client: u64) -> TaskEntry {
        TaskEntry::new(
            TaskId(id),
            SimTime::from_secs(due),
            0,
            Some(ClientId(client)),
            Box::new(Noop),
        )
    }

    fn drain_order(q: &TaskQueue) -> Vec<TaskId> {
        let mut out = Vec::new();
        while let Some(e) = q.pop_due(SimTime::from_secs(f64::MAX)) {
            out.push(e.id);
        }
        out
    }

    // ── ordering ───────────────────────────────────────────────

    #[test]
    fn drains_by_due_then_priority_then_insertion() {
        // A(t=5, p=1), B(t=5, p=2), C(t=3, p=1) added in that order
        // drain as C, B, A.
        let q = TaskQueue::new();
        q.add(entry(1, 5.0, 1)).unwrap();
        q.add(entry(2, 5.0, 2)).unwrap();
        q.add(entry(3, 3.0, 1)).unwrap();
        assert_eq!(drain_order(&q), vec![TaskId(3), TaskId(2), TaskId(1)]);
    }

    #[test]
    fn equal_keys_preserve_insertion_order() {
        let q = TaskQueue::new();
        for id in 1..=5 {
            q.add(entry(id, 2.0, 7)).unwrap();
        }
        assert_eq!(
            drain_order(&q),
            (1..=5).map(TaskId).collect::<Vec<_>>()
        );
    }

    #[test]
    fn immediate_tasks_sort_ahead_of_timed_tasks() {
        let q = TaskQueue::new();
        q.add(entry(1, 4.0, 0)).unwrap();
        q.add(entry(2, 0.0, 0)).unwrap();
        assert_eq!(q.head_due(), Some(SimTime::ZERO));
        assert_eq!(q.earliest_positive_due(), Some(SimTime::from_secs(4.0)));
    }

    // ── membership ─────────────────────────────────────────────

    #[test]
    fn double_add_is_a_noop() {
        let q = TaskQueue::new();
        q.add(entry(1, 1.0, 0)).unwrap();
        q.add(entry(2, 2.0, 0)).unwrap();
        let before = q.order_snapshot();

        let rejected = q.add(entry(1, 9.0, 9));
        assert!(rejected.is_err());
        assert_eq!(q.order_snapshot(), before);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn remove_clears_membership_and_absent_remove_is_noop() {
        let q = TaskQueue::new();
        q.add(entry(1, 1.0, 0)).unwrap();
        assert!(q.is_member(TaskId(1)));

        let removed = q.remove(TaskId(1)).unwrap();
        assert_eq!(removed.id, TaskId(1));
        assert!(!q.is_member(TaskId(1)));

        assert!(q.remove(TaskId(1)).is_none());
        assert!(q.remove(TaskId(42)).is_none());
    }

    #[test]
    fn removed_task_can_be_re_added() {
        let q = TaskQueue::new();
        q.add(entry(1, 5.0, 0)).unwrap();
        let e = q.remove(TaskId(1)).unwrap();
        q.add(e).unwrap();
        assert!(q.is_member(TaskId(1)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn remove_by_originator_takes_exactly_that_clients_tasks() {
        let q = TaskQueue::new();
        q.add(entry_for(1, 1.0, 7)).unwrap();
        q.add(entry_for(2, 2.0, 8)).unwrap();
        q.add(entry_for(3, 3.0, 7)).unwrap();
        q.add(entry(4, 4.0, 0)).unwrap();

        assert_eq!(q.remove_by_originator(ClientId(7)), 2);
        assert_eq!(drain_order(&q), vec![TaskId(2), TaskId(4)]);
        assert_eq!(q.remove_by_originator(ClientId(7)), 0);
    }

    // ── pop_due ────────────────────────────────────────────────

    #[test]
    fn pop_due_respects_due_times() {
        let q = TaskQueue::new();
        q.add(entry(1, 5.0, 0)).unwrap();
        assert!(q.pop_due(SimTime::from_secs(4.9)).is_none());
        assert!(q.pop_due(SimTime::from_secs(5.0)).is_some());
    }

    #[test]
    fn pop_due_always_yields_immediate_tasks() {
        let q = TaskQueue::new();
        q.add(entry(1, 0.0, 0)).unwrap();
        assert!(q.pop_due(SimTime::ZERO).is_some());
    }

    // ── blocking hand-off ──────────────────────────────────────

    #[test]
    fn wait_for_next_blocks_until_add() {
        let q = Arc::new(TaskQueue::new());
        let producer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                q.add(entry(1, 1.0, 0)).unwrap();
            })
        };
        let got = q.wait_for_next().unwrap();
        assert_eq!(got.id, TaskId(1));
        producer.join().unwrap();
    }

    #[test]
    fn close_releases_waiters() {
        let q = Arc::new(TaskQueue::new());
        let waiter = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || q.wait_for_next().is_none())
        };
        std::thread::sleep(Duration::from_millis(20));
        q.close();
        assert!(waiter.join().unwrap());
        assert!(q.add(entry(1, 1.0, 0)).is_err());
    }

    #[test]
    fn wait_for_change_since_sees_earlier_mutation() {
        let q = TaskQueue::new();
        let stamp = q.change_stamp();
        q.add(entry(1, 1.0, 0)).unwrap();
        // The mutation happened before the wait: must return
        // immediately rather than sleeping through it.
        assert!(q.wait_for_change_since(stamp, Some(Duration::from_secs(5))));
    }

    #[test]
    fn wait_for_change_since_times_out_without_mutation() {
        let q = TaskQueue::new();
        let stamp = q.change_stamp();
        assert!(!q.wait_for_change_since(stamp, Some(Duration::from_millis(20))));
    }

    // ── proptest: the ordering invariant holds at every point ──

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Add { id: u64, due: f64, priority: i32 },
            Remove { id: u64 },
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u64..16, 0.0f64..10.0, -3i32..3).prop_map(|(id, due, priority)| Op::Add {
                    id,
                    due,
                    priority
                }),
                (0u64..16).prop_map(|id| Op::Remove { id }),
            ]
        }

        fn assert_sorted(q: &TaskQueue) {
            let snap = q.order_snapshot();
            for w in snap.windows(2) {
                let (_, due_a, pri_a) = w[0];
                let (_, due_b, pri_b) = w[1];
                assert!(
                    due_a < due_b || (due_a == due_b && pri_a >= pri_b),
                    "order violated: ({due_a:?}, {pri_a}) before ({due_b:?}, {pri_b})"
                );
            }
        }

        proptest! {
            #[test]
            fn queue_is_sorted_after_every_operation(ops in prop::collection::vec(arb_op(), 0..64)) {
                let q = TaskQueue::new();
                for op in ops {
                    match op {
                        Op::Add { id, due, priority } => {
                            let _ = q.add(entry(id, due, priority));
                        }
                        Op::Remove { id } => {
                            let _ = q.remove(TaskId(id));
                        }
                    }
                    assert_sorted(&q);
                }
            }
        }
    }
}
