//! Discrete-event scheduling, motion, and state-handoff engine.
//!
//! The pieces compose as follows:
//!
//! ```text
//! Client threads                Simulation thread           Render thread
//!     |                              |                          |
//!     |--submit(Request)--------->[TaskQueue]                   |
//!     |   wrapped into a Task        | wait_for_next()          |
//!     |                              | (simulated clock,        |
//!     |                              |  never dispatches early) |
//!     |                              | task.process()           |
//!     |<--events via channel---------|   mutates bodies/paint   |
//!     |                              | exchange.offer(scene)    |
//!     |                              |                          |
//!     |                              |        exchange.retrieve(view)
//!     |                              |<-- open/close interlock--|
//! ```
//!
//! Exactly one thread drains the scheduler and runs `process()` calls
//! sequentially; that single-writer rule is what lets tasks mutate the
//! shared world without per-field locking. Everything else goes through
//! the queue's lock or the exchange's published snapshots.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod exchange;
pub mod motion;
pub mod queue;
pub mod sched;
pub mod session;
pub mod task;
pub mod world;

pub use clock::SimClock;
pub use config::{ConfigError, EngineConfig};
pub use exchange::{BodyView, PaintView, SceneView, StateExchange};
pub use queue::TaskQueue;
pub use sched::Scheduler;
pub use session::{Session, TaskContext};
pub use task::{Recurrence, Task, TaskEntry, PRIORITY_CLIENT, PRIORITY_HEARTBEAT, PRIORITY_MOTION};
pub use world::World;
