//! Strongly-typed identifiers and the per-session id generator.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a connected client for the lifetime of its connection.
///
/// Back-references (task originators, body owners) are stored as plain
/// `ClientId` values resolved through the session's registries, never
/// as owning references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Identifies a simulated body from placement until its owning client
/// disconnects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body-{}", self.0)
    }
}

/// Identifies a scheduled task. Queue membership is tracked by task id,
/// which makes double-add detection O(1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Identifies a part within a body. Part ids are positions in the
/// body's ordered part list, assigned by the plan loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(pub u32);

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part-{}", self.0)
    }
}

impl From<u32> for PartId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a paint trail record. Paint boxes outlive the body that
/// produced them — paint stays on the floor after a disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaintBoxId(pub u64);

impl fmt::Display for PaintBoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "paint-{}", self.0)
    }
}

/// Token returned by opening the scheduler interlock.
///
/// Tokens are monotonic: closing with a token older than the most
/// recently issued one is ignored (last-opened-wins).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterlockToken(pub u64);

impl fmt::Display for InterlockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interlock-{}", self.0)
    }
}

/// Per-session id generator.
///
/// Each session owns exactly one `IdSource` and threads it to whoever
/// allocates ids; there is no process-global counter, so two sessions
/// in one process produce independent, reproducible id streams.
/// Counters are atomic because tasks are created on producer threads.
#[derive(Debug, Default)]
pub struct IdSource {
    clients: AtomicU64,
    bodies: AtomicU64,
    tasks: AtomicU64,
    paint: AtomicU64,
}

impl IdSource {
    /// Create a generator with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next client id.
    pub fn client_id(&self) -> ClientId {
        ClientId(self.clients.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Allocate the next body id.
    pub fn body_id(&self) -> BodyId {
        BodyId(self.bodies.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Allocate the next task id.
    pub fn task_id(&self) -> TaskId {
        TaskId(self.tasks.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Allocate the next paint box id.
    pub fn paint_box_id(&self) -> PaintBoxId {
        PaintBoxId(self.paint.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_streams_are_independent_and_start_at_one() {
        let ids = IdSource::new();
        assert_eq!(ids.client_id(), ClientId(1));
        assert_eq!(ids.client_id(), ClientId(2));
        assert_eq!(ids.body_id(), BodyId(1));
        assert_eq!(ids.task_id(), TaskId(1));
        assert_eq!(ids.task_id(), TaskId(2));
        assert_eq!(ids.paint_box_id(), PaintBoxId(1));
    }

    #[test]
    fn two_sources_do_not_interfere() {
        let a = IdSource::new();
        let b = IdSource::new();
        a.client_id();
        a.client_id();
        assert_eq!(b.client_id(), ClientId(1));
    }
}
