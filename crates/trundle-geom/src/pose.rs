//! Body pose: position plus heading.

use std::fmt;

use crate::vec::Vec2;

/// A placement in the plane: position in metres, heading in radians
/// counter-clockwise from the positive x axis.
///
/// # Examples
///
/// ```
/// use trundle_geom::{Pose, Vec2};
///
/// let pose = Pose::new(Vec2::new(1.0, 0.0), std::f64::consts::FRAC_PI_2);
/// // A point one metre ahead of the body lands one metre up in world frame.
/// let world = pose.transform(Vec2::new(1.0, 0.0));
/// assert!((world - Vec2::new(1.0, 1.0)).length() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Pose {
    /// World position of the body origin.
    pub position: Vec2,
    /// Heading in radians, counter-clockwise from +x.
    pub heading: f64,
}

impl Pose {
    /// Create a pose from position and heading.
    pub const fn new(position: Vec2, heading: f64) -> Self {
        Self { position, heading }
    }

    /// Map a point from the body frame (x forward, y left) into the
    /// world frame.
    pub fn transform(&self, local: Vec2) -> Vec2 {
        self.position + local.rotated(self.heading)
    }

    /// Unit vector pointing along the heading.
    pub fn forward(&self) -> Vec2 {
        Vec2::from_heading(self.heading)
    }

    /// The heading folded into `(-pi, pi]`.
    pub fn normalized_heading(&self) -> f64 {
        normalize_angle(self.heading)
    }
}

/// Fold an angle into `(-pi, pi]`.
pub(crate) fn normalize_angle(a: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let mut a = a % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {:.3} rad", self.position, self.heading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn transform_is_rotate_then_translate() {
        let pose = Pose::new(Vec2::new(2.0, 3.0), PI);
        let p = pose.transform(Vec2::new(1.0, 0.0));
        assert!((p - Vec2::new(1.0, 3.0)).length() < 1e-12);
    }

    #[test]
    fn normalize_angle_folds_into_half_open_range() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-12);
        let folded = normalize_angle(-PI);
        assert!((folded - PI).abs() < 1e-12);
    }
}
