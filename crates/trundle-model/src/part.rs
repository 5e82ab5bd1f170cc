//! Body parts: a closed set of sensor and steering kinds.

use smallvec::SmallVec;
use trundle_core::event::SensorValue;
use trundle_geom::{Pose, Segment};

/// The closed set of part kinds a body can carry, with their static
/// parameters. Matching is exhaustive everywhere — adding a kind is a
/// compile-visible change.
#[derive(Clone, Debug, PartialEq)]
pub enum PartKind {
    /// Edge-triggered wall-contact detector. Its outline segments (body
    /// frame) are the contact-sensitive boundary swept during collision
    /// tests.
    ContactSensor {
        /// Contact-sensitive boundary, body frame.
        outline: SmallVec<[Segment; 4]>,
    },
    /// Distance-to-wall sensor along the mount heading.
    RangeSensor {
        /// Maximum detection distance in metres.
        max_range: f64,
    },
    /// Detector for enabled point targets inside an angular aperture.
    TargetSensor {
        /// Maximum detection distance in metres.
        max_range: f64,
        /// Full aperture width in radians, centred on the mount
        /// heading.
        aperture: f64,
    },
    /// Trail recorder: lays paint at the mount position while the body
    /// moves.
    PaintSensor {
        /// Whether the trail is laid.
        enabled: bool,
    },
    /// Two-wheel differential drive.
    DifferentialSteering {
        /// Distance between the wheels in metres.
        axle_track: f64,
        /// Per-wheel speed limit in m/s.
        max_wheel_speed: f64,
    },
    /// Speed-plus-steering-angle drive.
    AckermanSteering {
        /// Distance between axles in metres.
        wheelbase: f64,
        /// Forward speed limit in m/s.
        max_speed: f64,
        /// Steering angle limit in radians.
        max_steering: f64,
    },
    /// A part with no simulation behaviour (payload, decoration).
    Generic,
}

impl PartKind {
    /// Whether this kind produces sensor readings.
    pub fn is_sensor(&self) -> bool {
        matches!(
            self,
            Self::ContactSensor { .. }
                | Self::RangeSensor { .. }
                | Self::TargetSensor { .. }
                | Self::PaintSensor { .. }
        )
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ContactSensor { .. } => "contact-sensor",
            Self::RangeSensor { .. } => "range-sensor",
            Self::TargetSensor { .. } => "target-sensor",
            Self::PaintSensor { .. } => "paint-sensor",
            Self::DifferentialSteering { .. } => "differential-steering",
            Self::AckermanSteering { .. } => "ackerman-steering",
            Self::Generic => "generic",
        }
    }
}

/// Static definition of one part: its kind and where it mounts on the
/// body (body frame; the mount heading orients sensors).
#[derive(Clone, Debug, PartialEq)]
pub struct PartSpec {
    /// What the part is.
    pub kind: PartKind,
    /// Mount pose in the body frame.
    pub mount: Pose,
}

impl PartSpec {
    /// A part mounted at the body origin, facing forward.
    pub fn centred(kind: PartKind) -> Self {
        Self {
            kind,
            mount: Pose::default(),
        }
    }
}

/// Runtime state of one part on a placed body: the spec plus the last
/// computed sensor value (used for change detection).
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    /// The static definition.
    pub spec: PartSpec,
    /// Last computed reading, if the part is a sensor and has been
    /// evaluated. `SensorChanged` is emitted only when a fresh reading
    /// differs from this.
    pub last: Option<SensorValue>,
}

impl Part {
    /// Fresh runtime state for a spec.
    pub fn new(spec: PartSpec) -> Self {
        Self { spec, last: None }
    }
}
