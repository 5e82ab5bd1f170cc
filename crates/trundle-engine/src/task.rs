//! The task abstraction: a unit of scheduled work with an explicit
//! recurrence policy.
//!
//! A task never re-submits itself from inside its own execution: it
//! *returns* a [`Recurrence`] from [`process`](Task::process) and the
//! session's drain loop performs the re-submission. This keeps tasks
//! free of references back into the queue that owns them, and makes the
//! "never re-add while still a member" contract hold by construction
//! under the single-drainer model.

use trundle_core::id::{ClientId, TaskId};
use trundle_core::time::SimTime;

use crate::session::TaskContext;

/// Priority of the motion-evaluation task. System work dispatches ahead
/// of client requests due at the same time.
pub const PRIORITY_MOTION: i32 = 10;

/// Priority of client request tasks.
pub const PRIORITY_CLIENT: i32 = 0;

/// Priority of per-client heartbeat tasks. Liveness signals yield to
/// everything else.
pub const PRIORITY_HEARTBEAT: i32 = -10;

/// What a task wants to happen after `process()` returns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Recurrence {
    /// One-shot: the task is dropped.
    Done,
    /// Re-enqueue the same task with the given due time.
    At(SimTime),
}

/// A unit of scheduled work, executed on the simulation thread.
///
/// `process()` implementations are expected to be short and
/// non-blocking: a task already executing cannot be cancelled, and
/// every simulated millisecond spent here stalls the whole session.
pub trait Task: Send {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Execute the task. Runs on the simulation thread with exclusive
    /// access to the world; returns the recurrence policy.
    fn process(&mut self, ctx: &mut TaskContext<'_>) -> Recurrence;
}

/// A task together with its scheduling envelope.
///
/// The insertion sequence number is assigned by the queue on add; it is
/// the final tie-break in the ordering invariant and makes equal-key
/// ordering stable.
pub struct TaskEntry {
    /// Task identity; queue membership is tracked by this id.
    pub id: TaskId,
    /// Due time in simulated seconds. `<= 0` dispatches immediately.
    pub due: SimTime,
    /// Higher priorities dispatch first among tasks due together.
    pub priority: i32,
    /// The client this task belongs to, for bulk cancellation on
    /// disconnect. `None` for session-owned tasks.
    pub originator: Option<ClientId>,
    /// Insertion order, assigned by the queue.
    pub(crate) seq: u64,
    /// The work itself.
    pub task: Box<dyn Task>,
}

impl TaskEntry {
    /// Build an entry. The sequence number is assigned when the entry
    /// is added to a queue.
    pub fn new(
        id: TaskId,
        due: SimTime,
        priority: i32,
        originator: Option<ClientId>,
        task: Box<dyn Task>,
    ) -> Self {
        Self {
            id,
            due,
            priority,
            originator,
            seq: 0,
            task,
        }
    }
}

impl std::fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEntry")
            .field("id", &self.id)
            .field("due", &self.due)
            .field("priority", &self.priority)
            .field("originator", &self.originator)
            .field("seq", &self.seq)
            .field("task", &self.task.name())
            .finish()
    }
}
