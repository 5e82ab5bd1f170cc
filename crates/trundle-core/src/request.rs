//! The inbound request surface.
//!
//! The connection layer decodes the wire format into [`Request`] values;
//! the session wraps each request into exactly one scheduled task. All
//! state mutation happens later, inside that task, on the simulation
//! thread.

use trundle_geom::Pose;

use crate::id::PartId;

/// A decoded client request.
///
/// `delay_secs` shifts the dispatch time into the simulated future;
/// zero (the default) dispatches at the current simulated time.
///
/// # Examples
///
/// ```
/// use trundle_core::{Request, RequestPayload};
///
/// let req = Request::new(RequestPayload::Drive { left: 0.5, right: 0.5 });
/// assert_eq!(req.delay_secs, 0.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// The operation to perform.
    pub payload: RequestPayload,
    /// Simulated seconds between submission and dispatch.
    pub delay_secs: f64,
}

impl Request {
    /// A request dispatching at the current simulated time.
    pub fn new(payload: RequestPayload) -> Self {
        Self {
            payload,
            delay_secs: 0.0,
        }
    }

    /// A request dispatching `delay_secs` simulated seconds from now.
    pub fn after(payload: RequestPayload, delay_secs: f64) -> Self {
        Self {
            payload,
            delay_secs,
        }
    }
}

/// All request payloads.
///
/// Motion payloads address the client's placed body; requests for a
/// client without a body degrade to a logged no-op (a misbehaving
/// remote client must never crash the shared simulation).
#[derive(Clone, Debug, PartialEq)]
pub enum RequestPayload {
    /// Place a body built from the named plan prototype at `pose`.
    /// Answered with a `PlacementResult` event.
    Place {
        /// Name of a body prototype from the floor plan.
        prototype: String,
        /// Requested placement pose.
        pose: Pose,
    },
    /// Drive with differential wheel speeds (m/s per wheel).
    Drive {
        /// Left wheel speed.
        left: f64,
        /// Right wheel speed.
        right: f64,
    },
    /// Drive with a forward speed (m/s) and a steering angle (radians),
    /// Ackerman style.
    Steer {
        /// Forward speed.
        speed: f64,
        /// Front-wheel steering angle.
        steering_angle: f64,
    },
    /// Halt the current motion, if any. Emits `MotionHalted` with the
    /// `Requested` reason.
    Stop,
    /// Report the current value of one sensor via a `SensorChanged`
    /// event, whether or not it changed.
    QuerySensor {
        /// The sensor part to read.
        part: PartId,
    },
    /// Enable or disable the client's periodic heartbeat.
    SetHeartbeat {
        /// New enabled state.
        enabled: bool,
    },
    /// Change the simulated-seconds-per-real-second clock multiplier.
    SetSpeed {
        /// New multiplier; must be finite and positive.
        factor: f64,
    },
    /// Tear down the client: cancel its pending tasks and destroy its
    /// body. Paint trails stay on the floor.
    Disconnect,
}

impl RequestPayload {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Place { .. } => "place",
            Self::Drive { .. } => "drive",
            Self::Steer { .. } => "steer",
            Self::Stop => "stop",
            Self::QuerySensor { .. } => "query-sensor",
            Self::SetHeartbeat { .. } => "set-heartbeat",
            Self::SetSpeed { .. } => "set-speed",
            Self::Disconnect => "disconnect",
        }
    }
}
