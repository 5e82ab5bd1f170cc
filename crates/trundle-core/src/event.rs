//! The outbound event surface.
//!
//! The core emits typed events; serialization and transport are the
//! connection layer's responsibility. Events are delivered per client
//! over the channel handed out at connect time.

use std::fmt;

use trundle_geom::Pose;

use crate::id::{BodyId, PartId};
use crate::time::SimTime;

/// Why a motion stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaltReason {
    /// The motion ran its full requested duration.
    Completed,
    /// The motion was truncated by a wall contact.
    Collision,
    /// The client asked for a stop.
    Requested,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Collision => write!(f, "collision"),
            Self::Requested => write!(f, "requested"),
        }
    }
}

/// A target sensor fix: where an enabled target sits relative to the
/// sensor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetFix {
    /// Bearing from the sensor heading, radians, counter-clockwise
    /// positive, in `(-pi, pi]`.
    pub bearing: f64,
    /// Distance to the target in metres.
    pub range: f64,
}

/// A sensor reading. Which variant applies is fixed by the part kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorValue {
    /// Contact sensor: touching a wall. Edge-triggered — evaluated at
    /// motion start and halt only.
    Contact(bool),
    /// Range sensor: distance to the nearest wall along the sensor
    /// heading, or `None` beyond the sensor's reach.
    Range(Option<f64>),
    /// Target sensor: the nearest enabled target in the aperture, if
    /// any.
    Target(Option<TargetFix>),
    /// Paint sensor: whether the trail is currently being laid.
    Paint(bool),
}

/// A typed event emitted by the simulation core.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    /// A motion with positive duration began.
    MotionStarted {
        /// The moving body.
        body: BodyId,
        /// Resolved linear speed, m/s.
        linear: f64,
        /// Resolved turn rate, rad/s.
        turn_rate: f64,
        /// Planned duration in simulated seconds (after any collision
        /// truncation).
        duration: f64,
    },
    /// A motion ended.
    MotionHalted {
        /// The body that stopped.
        body: BodyId,
        /// Why it stopped.
        reason: HaltReason,
        /// Final pose.
        pose: Pose,
        /// Simulated seconds actually travelled.
        duration: f64,
    },
    /// A sensor's computed value changed (or was explicitly queried).
    SensorChanged {
        /// The body carrying the sensor.
        body: BodyId,
        /// The sensor part.
        part: PartId,
        /// The new reading.
        value: SensorValue,
    },
    /// Answer to a placement request.
    PlacementResult {
        /// The new body, if placement succeeded.
        body: Option<BodyId>,
        /// The granted pose, if placement succeeded.
        pose: Option<Pose>,
    },
    /// Periodic liveness signal carrying the current simulated time.
    Heartbeat {
        /// Simulated time at emission.
        sim_time: SimTime,
    },
    /// The client has been idle longer than the configured limit.
    Timeout {
        /// Real seconds since the client's last request.
        idle_secs: f64,
    },
}

impl SimEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MotionStarted { .. } => "motion-started",
            Self::MotionHalted { .. } => "motion-halted",
            Self::SensorChanged { .. } => "sensor-changed",
            Self::PlacementResult { .. } => "placement-result",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Timeout { .. } => "timeout",
        }
    }
}
