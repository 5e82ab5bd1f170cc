//! Time-parameterized pose trajectories.

use std::fmt;

use crate::pose::{normalize_angle, Pose};
use crate::vec::Vec2;
use crate::TURN_EPSILON;

/// A time-bounded pose trajectory: a start pose, constant linear and
/// angular velocity, and a `[time0, time1]` validity window in simulated
/// seconds.
///
/// A motion is immutable once built. Replacing a body's movement means
/// installing a *new* motion; truncating at a collision produces a new
/// motion via [`truncate_at`](Motion::truncate_at).
///
/// With a nonzero turn rate the trajectory is a circular arc (unicycle
/// model); otherwise it is a straight line.
///
/// # Examples
///
/// ```
/// use trundle_geom::{Motion, Pose, Vec2};
///
/// // 1 m/s straight along +x for 2 seconds, starting at t = 5.
/// let m = Motion::new(Pose::default(), 1.0, 0.0, 5.0, 2.0);
/// let end = m.end_pose();
/// assert!((end.position - Vec2::new(2.0, 0.0)).length() < 1e-12);
/// assert_eq!(m.time1(), 7.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    start: Pose,
    linear: f64,
    turn_rate: f64,
    time0: f64,
    time1: f64,
    collided: bool,
}

impl Motion {
    /// Create a motion from a start pose, linear speed (m/s along the
    /// heading), turn rate (rad/s, counter-clockwise positive), start
    /// time, and duration. A negative duration is clamped to zero.
    pub fn new(start: Pose, linear: f64, turn_rate: f64, time0: f64, duration: f64) -> Self {
        let duration = duration.max(0.0);
        Self {
            start,
            linear,
            turn_rate,
            time0,
            time1: time0 + duration,
            collided: false,
        }
    }

    /// A zero-duration motion holding `pose` at `time`. Used for bodies
    /// at rest and for requests rejected by an immediate collision.
    pub fn null_at(pose: Pose, time: f64) -> Self {
        Self {
            start: pose,
            linear: 0.0,
            turn_rate: 0.0,
            time0: time,
            time1: time,
            collided: false,
        }
    }

    /// Start pose.
    pub fn start_pose(&self) -> Pose {
        self.start
    }

    /// Linear speed in m/s.
    pub fn linear(&self) -> f64 {
        self.linear
    }

    /// Turn rate in rad/s.
    pub fn turn_rate(&self) -> f64 {
        self.turn_rate
    }

    /// Start of the validity window (simulated seconds).
    pub fn time0(&self) -> f64 {
        self.time0
    }

    /// End of the validity window (simulated seconds).
    pub fn time1(&self) -> f64 {
        self.time1
    }

    /// Window length in simulated seconds.
    pub fn duration(&self) -> f64 {
        self.time1 - self.time0
    }

    /// Whether this motion has zero duration.
    pub fn is_null(&self) -> bool {
        self.duration() == 0.0
    }

    /// Whether this motion was truncated by a collision.
    pub fn collided(&self) -> bool {
        self.collided
    }

    /// The collision time (equal to [`time1`](Motion::time1)), if the
    /// motion was truncated by a collision.
    pub fn collision_time(&self) -> Option<f64> {
        self.collided.then_some(self.time1)
    }

    /// Whether the motion is still running at simulated time `t`.
    pub fn in_progress(&self, t: f64) -> bool {
        t < self.time1 && !self.is_null()
    }

    /// The pose at simulated time `t`, clamped to the validity window.
    pub fn pose_at(&self, t: f64) -> Pose {
        let dt = (t.clamp(self.time0, self.time1)) - self.time0;
        let h0 = self.start.heading;
        if self.turn_rate.abs() < TURN_EPSILON {
            Pose::new(
                self.start.position + Vec2::from_heading(h0) * (self.linear * dt),
                h0,
            )
        } else {
            // Unicycle arc: radius = linear / turn_rate.
            let h = h0 + self.turn_rate * dt;
            let r = self.linear / self.turn_rate;
            let dx = r * (h.sin() - h0.sin());
            let dy = r * (h0.cos() - h.cos());
            Pose::new(
                self.start.position + Vec2::new(dx, dy),
                normalize_angle(h),
            )
        }
    }

    /// The pose at the end of the window.
    pub fn end_pose(&self) -> Pose {
        self.pose_at(self.time1)
    }

    /// A copy truncated at absolute simulated time `t` with the
    /// collision flag set. `t` is clamped to the validity window, so
    /// truncating at (or before) `time0` yields a collided null motion.
    pub fn truncate_at(self, t: f64) -> Motion {
        Motion {
            time1: t.clamp(self.time0, self.time1),
            collided: true,
            ..self
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "motion {:.3} m/s, {:.3} rad/s over [{:.3}, {:.3}]",
            self.linear, self.turn_rate, self.time0, self.time1
        )
    }
}
