//! Environment model for the Trundle simulator.
//!
//! [`FloorPlan`] is the static world: wall segments, plan bounds, point
//! targets, and body prototypes. It is produced by an external loader
//! before the scheduler starts and treated as read-only afterwards.
//!
//! [`Body`] and [`PaintBox`] are the mutable entities: bodies are
//! created when a client is placed into the plan and destroyed when it
//! disconnects; paint trails are append-only and stay on the floor.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod body;
mod paint;
mod part;
mod plan;

pub use body::Body;
pub use paint::{PaintBox, PAINT_SEGMENT_POINTS};
pub use part::{Part, PartKind, PartSpec};
pub use plan::{BodyPrototype, FloorPlan, PlanError, Target};
