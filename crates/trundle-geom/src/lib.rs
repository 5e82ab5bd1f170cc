//! 2-D geometry and motion kernels for the Trundle simulator.
//!
//! This is the leaf math crate: vectors, poses, segments, the
//! time-parameterized [`Motion`] trajectory, and the swept-collision
//! test used to truncate a motion at its first wall contact.
//!
//! Units are metres, radians, and simulated seconds throughout.
//! Headings are counter-clockwise from the positive x axis.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod motion;
mod pose;
mod segment;
mod sweep;
mod vec;

pub use motion::Motion;
pub use pose::Pose;
pub use segment::Segment;
pub use sweep::{earliest_collision, outline_at, outlines_touch};
pub use vec::Vec2;

/// Length (metres) below which a segment or displacement is treated as
/// degenerate. Degenerate geometry never collides (it resolves as
/// "no collision" rather than an error).
pub const GEOM_EPSILON: f64 = 1e-9;

/// Angular rate (rad/s) below which a motion is integrated as a straight
/// line rather than a circular arc.
pub const TURN_EPSILON: f64 = 1e-9;
