//! Swept collision: earliest contact time of a moving outline against
//! static walls.
//!
//! Translation-only sweeps are solved in closed form: a segment moving
//! at constant velocity first touches a static segment when one of the
//! moving endpoints crosses the static segment, or one of the static
//! endpoints crosses the moving segment (in the moving frame). Rotating
//! sweeps have no polynomial closed form; they are bracketed by fine
//! time sampling and refined by bisection.
//!
//! There is deliberately no bounding-box pre-check: every outline
//! segment is tested against every wall segment.

use crate::motion::Motion;
use crate::pose::Pose;
use crate::segment::Segment;
use crate::vec::Vec2;
use crate::{GEOM_EPSILON, TURN_EPSILON};

/// Maximum displacement (metres) of any outline point between two
/// samples of a rotating sweep. Small enough that a body cannot step
/// over a wall between samples at simulator scales.
const SWEEP_RESOLUTION: f64 = 0.005;

/// Bisection terminates when the bracket is narrower than this
/// (simulated seconds).
const SWEEP_TIME_EPSILON: f64 = 1e-9;

/// Transform a body-frame outline into world frame at `pose`.
pub fn outline_at(outline: &[Segment], pose: &Pose) -> Vec<Segment> {
    outline.iter().map(|s| s.transformed(pose)).collect()
}

/// Whether a world-frame outline touches any wall segment.
pub fn outlines_touch(outline_world: &[Segment], walls: &[Segment]) -> bool {
    outline_world
        .iter()
        .any(|s| walls.iter().any(|w| s.intersects(w)))
}

/// Earliest contact time of `outline` (body frame) carried by `motion`
/// against `walls`, as an offset from the motion's start time in
/// `[0, duration]`. Returns `None` when the motion completes without
/// contact.
///
/// A start pose already touching a wall yields `Some(0.0)` — the
/// caller replaces the motion with a null motion and the movement never
/// starts. Degenerate segments (outline or wall) never collide.
pub fn earliest_collision(outline: &[Segment], motion: &Motion, walls: &[Segment]) -> Option<f64> {
    if outline.is_empty() || walls.is_empty() {
        return None;
    }

    // Already-overlapping start pose resolves as an immediate collision.
    if touches_at(outline, motion, motion.time0(), walls) {
        return Some(0.0);
    }

    let duration = motion.duration();
    if duration <= 0.0 {
        return None;
    }

    if motion.turn_rate().abs() < TURN_EPSILON {
        translation_sweep(outline, motion, walls, duration)
    } else {
        sampled_sweep(outline, motion, walls, duration)
    }
}

/// Overlap predicate at absolute simulated time `t`, transforming the
/// outline on the fly (no allocation — this runs inside bisection).
fn touches_at(outline: &[Segment], motion: &Motion, t: f64, walls: &[Segment]) -> bool {
    let pose = motion.pose_at(t);
    outline
        .iter()
        .any(|s| walls.iter().any(|w| s.transformed(&pose).intersects(w)))
}

/// Closed-form sweep for a non-rotating motion: the whole outline moves
/// at one constant world velocity.
fn translation_sweep(
    outline: &[Segment],
    motion: &Motion,
    walls: &[Segment],
    duration: f64,
) -> Option<f64> {
    let pose0 = motion.pose_at(motion.time0());
    let velocity = pose0.forward() * motion.linear();
    if velocity.length() < GEOM_EPSILON {
        // Turning below threshold and not translating: the pose is
        // effectively frozen, and t = 0 overlap was already ruled out.
        return None;
    }

    let mut earliest: Option<f64> = None;
    let mut consider = |t: Option<f64>| {
        if let Some(t) = t {
            if t <= duration && earliest.map_or(true, |best| t < best) {
                earliest = Some(t);
            }
        }
    };

    for local in outline {
        if local.is_degenerate() {
            continue;
        }
        let moving = local.transformed(&pose0);
        for wall in walls {
            if wall.is_degenerate() {
                continue;
            }
            // Moving endpoints crossing the static wall.
            consider(point_crossing(moving.a, velocity, wall, duration));
            consider(point_crossing(moving.b, velocity, wall, duration));
            // Wall endpoints crossing the moving segment (relative frame).
            consider(point_crossing(wall.a, -velocity, &moving, duration));
            consider(point_crossing(wall.b, -velocity, &moving, duration));
        }
    }
    earliest
}

/// Earliest `t in [0, duration]` at which the point `p + velocity * t`
/// lies on `seg`, or `None`.
fn point_crossing(p: Vec2, velocity: Vec2, seg: &Segment, duration: f64) -> Option<f64> {
    let d = seg.direction();
    let denom = velocity.cross(d);
    let w = seg.a - p;

    if denom.abs() < GEOM_EPSILON {
        // Path parallel to the segment: contact only when collinear.
        let unit = d.normalized()?;
        if w.cross(unit).abs() > GEOM_EPSILON {
            return None;
        }
        let speed = velocity.length();
        if speed < GEOM_EPSILON {
            return None;
        }
        let along = velocity * (1.0 / speed);
        let sa = (seg.a - p).dot(along);
        let sb = (seg.b - p).dot(along);
        let (near, far) = if sa <= sb { (sa, sb) } else { (sb, sa) };
        if far < 0.0 {
            return None;
        }
        let t = near.max(0.0) / speed;
        (t <= duration).then_some(t)
    } else {
        let t = w.cross(d) / denom;
        let u = w.cross(velocity) / denom;
        ((0.0..=duration).contains(&t) && (-GEOM_EPSILON..=1.0 + GEOM_EPSILON).contains(&u))
            .then_some(t)
    }
}

/// Sample-and-bisect sweep for rotating motions.
///
/// Samples are spaced so no outline point moves farther than
/// [`SWEEP_RESOLUTION`] between consecutive samples; the first touching
/// sample brackets the contact, and bisection refines the bracket to
/// [`SWEEP_TIME_EPSILON`].
fn sampled_sweep(
    outline: &[Segment],
    motion: &Motion,
    walls: &[Segment],
    duration: f64,
) -> Option<f64> {
    // Fastest-moving outline point bounds the step size.
    let max_radius = outline
        .iter()
        .flat_map(|s| [s.a, s.b])
        .map(Vec2::length)
        .fold(0.0f64, f64::max);
    let max_speed = motion.linear().abs() + motion.turn_rate().abs() * max_radius;
    if max_speed < GEOM_EPSILON {
        return None;
    }
    let step = (SWEEP_RESOLUTION / max_speed).min(duration);

    let t0 = motion.time0();
    let mut prev = 0.0f64;
    loop {
        let next = (prev + step).min(duration);
        if touches_at(outline, motion, t0 + next, walls) {
            return Some(bisect_contact(outline, motion, walls, prev, next));
        }
        if next >= duration {
            return None;
        }
        prev = next;
    }
}

/// Refine a (no-contact, contact) bracket to the earliest touching
/// offset. `lo` is known clear, `hi` known touching.
fn bisect_contact(
    outline: &[Segment],
    motion: &Motion,
    walls: &[Segment],
    mut lo: f64,
    mut hi: f64,
) -> f64 {
    let t0 = motion.time0();
    while hi - lo > SWEEP_TIME_EPSILON {
        let mid = 0.5 * (lo + hi);
        if touches_at(outline, motion, t0 + mid, walls) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn seg(ax: f64, ay: f64, bx: f64, by: f64) -> Segment {
        Segment::new(Vec2::new(ax, ay), Vec2::new(bx, by))
    }

    /// A 1 m wide bumper centred on the body origin, facing forward.
    fn bumper() -> Vec<Segment> {
        vec![seg(0.0, -0.5, 0.0, 0.5)]
    }

    #[test]
    fn perpendicular_approach_collides_at_distance_over_speed() {
        // Wall 3 m ahead, approached at 2 m/s: contact at t = 1.5.
        let wall = vec![seg(3.0, -1.0, 3.0, 1.0)];
        let motion = Motion::new(Pose::default(), 2.0, 0.0, 0.0, 10.0);
        let t = earliest_collision(&bumper(), &motion, &wall).unwrap();
        assert!((t - 1.5).abs() < 1e-9, "expected 1.5, got {t}");
    }

    #[test]
    fn overlapping_start_pose_collides_at_zero() {
        let wall = vec![seg(0.0, -1.0, 0.0, 1.0)];
        let motion = Motion::new(Pose::default(), 1.0, 0.0, 0.0, 5.0);
        assert_eq!(earliest_collision(&bumper(), &motion, &wall), Some(0.0));
    }

    #[test]
    fn motion_away_from_wall_never_collides() {
        let wall = vec![seg(3.0, -1.0, 3.0, 1.0)];
        let motion = Motion::new(Pose::default(), -1.0, 0.0, 0.0, 10.0);
        assert_eq!(earliest_collision(&bumper(), &motion, &wall), None);
    }

    #[test]
    fn short_motion_stops_before_wall() {
        let wall = vec![seg(3.0, -1.0, 3.0, 1.0)];
        let motion = Motion::new(Pose::default(), 1.0, 0.0, 0.0, 2.0);
        assert_eq!(earliest_collision(&bumper(), &motion, &wall), None);
    }

    #[test]
    fn wall_vertex_crossing_moving_segment_is_detected() {
        // A short wall stub pointing away from the body: only the
        // wall's near endpoint ever enters the swept area.
        let wall = vec![seg(2.0, 0.0, 2.5, 0.0)];
        let outline = vec![seg(0.0, -1.0, 0.0, 1.0)];
        let motion = Motion::new(Pose::default(), 1.0, 0.0, 0.0, 10.0);
        let t = earliest_collision(&outline, &motion, &wall).unwrap();
        assert!((t - 2.0).abs() < 1e-9, "expected 2.0, got {t}");
    }

    #[test]
    fn collinear_head_on_approach_is_detected() {
        // Outline and wall on the same line; the leading endpoint
        // reaches the wall after 2 s at 1 m/s.
        let outline = vec![seg(0.0, 0.0, 1.0, 0.0)];
        let wall = vec![seg(3.0, 0.0, 4.0, 0.0)];
        let motion = Motion::new(Pose::default(), 1.0, 0.0, 0.0, 10.0);
        let t = earliest_collision(&outline, &motion, &wall).unwrap();
        assert!((t - 2.0).abs() < 1e-9, "expected 2.0, got {t}");
    }

    #[test]
    fn degenerate_wall_never_collides() {
        let wall = vec![seg(2.0, 0.0, 2.0, 0.0)];
        let motion = Motion::new(Pose::default(), 1.0, 0.0, 0.0, 10.0);
        assert_eq!(earliest_collision(&bumper(), &motion, &wall), None);
    }

    #[test]
    fn rotating_arm_sweeps_into_wall() {
        // A 1 m arm spinning in place at pi/2 rad/s reaches a wall at
        // height 0.9 when the tip's elevation crosses it:
        // t = asin(0.9) / (pi/2).
        let arm = vec![seg(0.0, 0.0, 1.0, 0.0)];
        let wall = vec![seg(-0.5, 0.9, 0.5, 0.9)];
        let motion = Motion::new(Pose::default(), 0.0, FRAC_PI_2, 0.0, 2.0);
        let t = earliest_collision(&arm, &motion, &wall).unwrap();
        let expected = 0.9f64.asin() / FRAC_PI_2;
        assert!((t - expected).abs() < 1e-3, "expected {expected}, got {t}");
    }

    #[test]
    fn heading_is_honoured_in_translation_sweep() {
        // Facing +y, wall above.
        let wall = vec![seg(-1.0, 2.0, 1.0, 2.0)];
        let motion = Motion::new(Pose::new(Vec2::ZERO, FRAC_PI_2), 1.0, 0.0, 0.0, 10.0);
        let t = earliest_collision(&bumper(), &motion, &wall).unwrap();
        assert!((t - 2.0).abs() < 1e-9, "expected 2.0, got {t}");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Straight-line motion aimed perpendicular at a wall at
            // distance d with speed v collides at d / v.
            #[test]
            fn perpendicular_collision_time_is_distance_over_speed(
                d in 1.0f64..20.0,
                v in 0.1f64..5.0,
            ) {
                let wall = vec![seg(d, -5.0, d, 5.0)];
                let motion = Motion::new(Pose::default(), v, 0.0, 0.0, 1000.0);
                let t = earliest_collision(&bumper(), &motion, &wall).unwrap();
                prop_assert!((t - d / v).abs() < 1e-6, "d={d} v={v} t={t}");
            }

            // A motion pointed away from every wall never collides.
            #[test]
            fn receding_motion_never_collides(
                d in 1.0f64..20.0,
                v in 0.1f64..5.0,
            ) {
                let wall = vec![seg(d, -5.0, d, 5.0)];
                let motion = Motion::new(Pose::default(), -v, 0.0, 0.0, 100.0);
                prop_assert_eq!(earliest_collision(&bumper(), &motion, &wall), None);
            }
        }
    }
}
