//! The motion engine: actuator translation, collision truncation, and
//! stepwise sensor re-evaluation.
//!
//! A motion request is resolved into linear/angular velocity, capped at
//! the configured duration, swept against every wall, and truncated at
//! the earliest contact. While a motion is in progress the engine is
//! re-invoked at the modeling interval (shortened near completion) to
//! advance the pose and re-evaluate non-contact sensors; contact
//! sensors are edge-triggered and touched only at the start and at the
//! completion/collision boundary of a motion.

use tracing::debug;
use trundle_core::error::RequestError;
use trundle_core::event::{HaltReason, SensorValue, SimEvent, TargetFix};
use trundle_core::id::{BodyId, ClientId, PartId};
use trundle_core::time::SimTime;
use trundle_geom::{earliest_collision, outlines_touch, Motion, Pose, Vec2};
use trundle_model::{Body, FloorPlan, PaintBox, PartKind};

use crate::config::EngineConfig;
use crate::world::World;

/// Tolerance when deciding a sensor reading has changed.
const SENSOR_EPSILON: f64 = 1e-6;

/// Minimum spacing between laid paint points, metres.
const PAINT_SPACING: f64 = 0.02;

/// Slack when deciding a motion has reached its completion boundary.
const STEP_SLACK: f64 = 1e-9;

/// Events produced during a task, routed to clients by the drain loop.
pub(crate) type Outbox = Vec<(ClientId, SimEvent)>;

/// Resolved body-level velocities for a motion request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Velocities {
    /// Linear speed along the heading, m/s.
    pub linear: f64,
    /// Turn rate, rad/s.
    pub turn_rate: f64,
}

/// Translate differential wheel speeds into body velocities, clamped to
/// the steering part's wheel-speed limit.
pub fn resolve_differential(body: &Body, left: f64, right: f64) -> Result<Velocities, RequestError> {
    if !left.is_finite() || !right.is_finite() {
        return Err(RequestError::InvalidParameter {
            what: "wheel speed",
        });
    }
    let (axle_track, max_wheel_speed) = body
        .parts()
        .iter()
        .find_map(|p| match p.spec.kind {
            PartKind::DifferentialSteering {
                axle_track,
                max_wheel_speed,
            } => Some((axle_track, max_wheel_speed)),
            _ => None,
        })
        .ok_or(RequestError::MissingActuator {
            wanted: "differential-steering",
        })?;
    debug_assert!(axle_track > 0.0, "prototype with non-positive axle track");
    let left = left.clamp(-max_wheel_speed, max_wheel_speed);
    let right = right.clamp(-max_wheel_speed, max_wheel_speed);
    Ok(Velocities {
        linear: 0.5 * (left + right),
        turn_rate: (right - left) / axle_track,
    })
}

/// Translate a speed-plus-steering-angle request into body velocities,
/// clamped to the steering part's limits.
pub fn resolve_ackerman(body: &Body, speed: f64, angle: f64) -> Result<Velocities, RequestError> {
    if !speed.is_finite() || !angle.is_finite() {
        return Err(RequestError::InvalidParameter {
            what: "speed or steering angle",
        });
    }
    let (wheelbase, max_speed, max_steering) = body
        .parts()
        .iter()
        .find_map(|p| match p.spec.kind {
            PartKind::AckermanSteering {
                wheelbase,
                max_speed,
                max_steering,
            } => Some((wheelbase, max_speed, max_steering)),
            _ => None,
        })
        .ok_or(RequestError::MissingActuator {
            wanted: "ackerman-steering",
        })?;
    debug_assert!(wheelbase > 0.0, "prototype with non-positive wheelbase");
    let speed = speed.clamp(-max_speed, max_speed);
    let angle = angle.clamp(-max_steering, max_steering);
    Ok(Velocities {
        linear: speed,
        turn_rate: speed * angle.tan() / wheelbase,
    })
}

/// Install a new motion on `body_id`, truncated at the earliest wall
/// contact. Returns the simulated time at which the motion wants its
/// next evaluation, or `None` when no motion is left in progress.
///
/// A zero-magnitude request yields an immediate null motion (halted as
/// `Completed` with zero duration); a start pose already touching a
/// wall yields a collided null motion — the movement never starts.
pub(crate) fn start_motion(
    world: &mut World,
    body_id: BodyId,
    v: Velocities,
    now: f64,
    cfg: &EngineConfig,
    out: &mut Outbox,
) -> Option<SimTime> {
    let World { plan, bodies, .. } = world;
    let body = bodies
        .get_mut(&body_id)
        .expect("body absent when motion expected");
    let owner = body.owner();

    // A new request supersedes an in-progress motion.
    if body.motion().in_progress(now) {
        let pose = body.motion().pose_at(now);
        let travelled = now - body.motion().time0();
        out.push((
            owner,
            SimEvent::MotionHalted {
                body: body_id,
                reason: HaltReason::Requested,
                pose,
                duration: travelled,
            },
        ));
    }
    let pose = body.motion().pose_at(now);

    if v.linear.abs() < f64::EPSILON && v.turn_rate.abs() < f64::EPSILON {
        body.set_motion(Motion::null_at(pose, now));
        out.push((
            owner,
            SimEvent::MotionHalted {
                body: body_id,
                reason: HaltReason::Completed,
                pose,
                duration: 0.0,
            },
        ));
        return None;
    }

    let candidate = Motion::new(pose, v.linear, v.turn_rate, now, cfg.max_motion_secs);
    let outline = body.contact_outline();
    let motion = match earliest_collision(&outline, &candidate, plan.walls()) {
        Some(t) if t <= 0.0 => {
            // The start pose already touches a wall: the requested
            // movement never starts.
            body.set_motion(Motion::null_at(pose, now));
            out.push((
                owner,
                SimEvent::MotionHalted {
                    body: body_id,
                    reason: HaltReason::Collision,
                    pose,
                    duration: 0.0,
                },
            ));
            set_contact(body, true, out);
            return None;
        }
        Some(t) => candidate.truncate_at(now + t),
        None => candidate,
    };

    out.push((
        owner,
        SimEvent::MotionStarted {
            body: body_id,
            linear: v.linear,
            turn_rate: v.turn_rate,
            duration: motion.duration(),
        },
    ));
    set_contact(body, false, out);
    let next = next_step(now, motion.time1(), cfg);
    body.set_motion(motion);
    Some(SimTime::from_secs(next))
}

/// Halt a client's in-progress motion at `now` (the `Stop` request).
pub(crate) fn halt_motion(world: &mut World, client: ClientId, now: f64, out: &mut Outbox) {
    let Some(body) = world.body_by_owner_mut(client) else {
        debug!(%client, "stop ignored: no placed body");
        return;
    };
    let motion = *body.motion();
    if !motion.in_progress(now) {
        debug!(%client, "stop ignored: no motion in progress");
        return;
    }
    let pose = motion.pose_at(now);
    body.set_motion(Motion::null_at(pose, now));
    out.push((
        client,
        SimEvent::MotionHalted {
            body: body.id(),
            reason: HaltReason::Requested,
            pose,
            duration: now - motion.time0(),
        },
    ));
}

/// One pass of the motion-evaluation task: advance every in-progress
/// motion to `now`, re-evaluate sensors, emit halts at completion
/// boundaries. Returns the minimum next due time across all bodies
/// still in motion — `None` drops the task out of the queue entirely.
pub(crate) fn evaluate(
    world: &mut World,
    now: f64,
    cfg: &EngineConfig,
    out: &mut Outbox,
) -> Option<SimTime> {
    let World {
        plan,
        bodies,
        paint,
    } = world;
    let mut next: Option<f64> = None;

    for body in bodies.values_mut() {
        let motion = *body.motion();
        if motion.is_null() {
            continue;
        }
        if now >= motion.time1() - STEP_SLACK {
            // Completion or collision boundary.
            let pose = motion.end_pose();
            let reason = if motion.collided() {
                HaltReason::Collision
            } else {
                HaltReason::Completed
            };
            body.set_motion(Motion::null_at(pose, motion.time1()));
            out.push((
                body.owner(),
                SimEvent::MotionHalted {
                    body: body.id(),
                    reason,
                    pose,
                    duration: motion.duration(),
                },
            ));
            eval_step_sensors(body, &pose, plan, paint, out);
            set_contact(body, motion.collided(), out);
        } else if motion.in_progress(now) {
            let pose = motion.pose_at(now);
            eval_step_sensors(body, &pose, plan, paint, out);
            let due = next_step(now, motion.time1(), cfg);
            next = Some(next.map_or(due, |n: f64| n.min(due)));
        }
    }
    next.map(SimTime::from_secs)
}

/// Read one sensor on demand. Unlike the stepwise path this does not
/// filter unchanged values — a query is always answered.
pub(crate) fn query_sensor(
    world: &mut World,
    client: ClientId,
    part_id: PartId,
    now: f64,
) -> Result<(BodyId, SensorValue), RequestError> {
    let World { plan, bodies, .. } = world;
    let body = bodies
        .values_mut()
        .find(|b| b.owner() == client)
        .ok_or(RequestError::NotPlaced)?;
    let pose = body.pose_at(now);
    let id = body.id();

    let kind = body
        .part(part_id)
        .map(|p| p.spec.kind.clone())
        .ok_or(RequestError::UnknownPart { part: part_id })?;
    let mount = body.part(part_id).map(|p| p.spec.mount).unwrap_or_default();

    let value = match kind {
        PartKind::ContactSensor { outline } => {
            let world_outline: Vec<_> = outline
                .iter()
                .map(|s| s.transformed(&mount).transformed(&pose))
                .collect();
            SensorValue::Contact(outlines_touch(&world_outline, plan.walls()))
        }
        PartKind::RangeSensor { max_range } => {
            SensorValue::Range(range_reading(&pose, &mount, max_range, plan))
        }
        PartKind::TargetSensor {
            max_range,
            aperture,
        } => SensorValue::Target(target_reading(&pose, &mount, max_range, aperture, plan)),
        PartKind::PaintSensor { enabled } => SensorValue::Paint(enabled),
        PartKind::DifferentialSteering { .. }
        | PartKind::AckermanSteering { .. }
        | PartKind::Generic => {
            return Err(RequestError::NotASensor { part: part_id });
        }
    };

    if let Some(part) = body.part_mut(part_id) {
        part.last = Some(value);
    }
    Ok((id, value))
}

/// The next modeling step: a fixed interval, shortened to land exactly
/// on the motion's completion boundary.
fn next_step(now: f64, time1: f64, cfg: &EngineConfig) -> f64 {
    (now + cfg.motion_step_secs).min(time1)
}

/// Edge-trigger every contact sensor to `touching`, emitting a change
/// event per sensor whose state flips.
fn set_contact(body: &mut Body, touching: bool, out: &mut Outbox) {
    let id = body.id();
    let owner = body.owner();
    for (index, part) in body.parts_mut().iter_mut().enumerate() {
        if !matches!(part.spec.kind, PartKind::ContactSensor { .. }) {
            continue;
        }
        let value = SensorValue::Contact(touching);
        if part.last.map_or(true, |last| differs(&last, &value)) {
            part.last = Some(value);
            out.push((
                owner,
                SimEvent::SensorChanged {
                    body: id,
                    part: PartId(index as u32),
                    value,
                },
            ));
        }
    }
}

/// Re-evaluate the non-contact sensors (range, target, paint) at
/// `pose`, emitting a change event only when a reading differs from the
/// previous one. Contact sensors are left alone — they are evaluated at
/// motion boundaries only.
fn eval_step_sensors(
    body: &mut Body,
    pose: &Pose,
    plan: &FloorPlan,
    paint: &mut indexmap::IndexMap<trundle_core::id::PaintBoxId, PaintBox>,
    out: &mut Outbox,
) {
    let id = body.id();
    let owner = body.owner();
    let paint_box = body.paint_box();

    for (index, part) in body.parts_mut().iter_mut().enumerate() {
        let value = match part.spec.kind {
            PartKind::RangeSensor { max_range } => {
                SensorValue::Range(range_reading(pose, &part.spec.mount, max_range, plan))
            }
            PartKind::TargetSensor {
                max_range,
                aperture,
            } => SensorValue::Target(target_reading(
                pose,
                &part.spec.mount,
                max_range,
                aperture,
                plan,
            )),
            PartKind::PaintSensor { enabled } => {
                if enabled {
                    if let Some(pb) = paint_box.and_then(|pid| paint.get_mut(&pid)) {
                        let tip = pose.transform(part.spec.mount.position);
                        let moved = pb
                            .last_point()
                            .map_or(true, |last| last.distance(tip) >= PAINT_SPACING);
                        if moved {
                            pb.push(tip);
                        }
                    }
                }
                SensorValue::Paint(enabled)
            }
            PartKind::ContactSensor { .. }
            | PartKind::DifferentialSteering { .. }
            | PartKind::AckermanSteering { .. }
            | PartKind::Generic => continue,
        };

        if part.last.map_or(true, |last| differs(&last, &value)) {
            part.last = Some(value);
            out.push((
                owner,
                SimEvent::SensorChanged {
                    body: id,
                    part: PartId(index as u32),
                    value,
                },
            ));
        }
    }
}

/// Distance to the nearest wall along the sensor heading, within range.
fn range_reading(pose: &Pose, mount: &Pose, max_range: f64, plan: &FloorPlan) -> Option<f64> {
    let origin = pose.transform(mount.position);
    let dir = Vec2::from_heading(pose.heading + mount.heading);
    plan.walls()
        .iter()
        .filter_map(|w| w.raycast(origin, dir))
        .fold(None, |best: Option<f64>, d| {
            Some(best.map_or(d, |b| b.min(d)))
        })
        .filter(|d| *d <= max_range)
}

/// The nearest enabled target inside the sensor's aperture and range.
fn target_reading(
    pose: &Pose,
    mount: &Pose,
    max_range: f64,
    aperture: f64,
    plan: &FloorPlan,
) -> Option<TargetFix> {
    let origin = pose.transform(mount.position);
    let heading = pose.heading + mount.heading;
    let mut best: Option<TargetFix> = None;
    for target in plan.targets() {
        if !target.enabled {
            continue;
        }
        let delta = target.position - origin;
        let range = delta.length();
        if range > max_range {
            continue;
        }
        let bearing = fold_angle(delta.y.atan2(delta.x) - heading);
        if bearing.abs() > 0.5 * aperture {
            continue;
        }
        if best.map_or(true, |b| range < b.range) {
            best = Some(TargetFix { bearing, range });
        }
    }
    best
}

/// Fold an angle into `(-pi, pi]`.
fn fold_angle(a: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let mut a = a % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Whether two readings differ beyond the comparison tolerance.
fn differs(a: &SensorValue, b: &SensorValue) -> bool {
    match (a, b) {
        (SensorValue::Contact(x), SensorValue::Contact(y)) => x != y,
        (SensorValue::Paint(x), SensorValue::Paint(y)) => x != y,
        (SensorValue::Range(Some(x)), SensorValue::Range(Some(y))) => {
            (x - y).abs() > SENSOR_EPSILON
        }
        (SensorValue::Range(None), SensorValue::Range(None)) => false,
        (SensorValue::Target(Some(x)), SensorValue::Target(Some(y))) => {
            (x.bearing - y.bearing).abs() > SENSOR_EPSILON
                || (x.range - y.range).abs() > SENSOR_EPSILON
        }
        (SensorValue::Target(None), SensorValue::Target(None)) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use std::sync::Arc;
    use trundle_geom::Segment;
    use trundle_model::{BodyPrototype, PartSpec, Target};

    fn plan_with_wall() -> FloorPlan {
        let mut plan =
            FloorPlan::new(Vec2::new(-50.0, -50.0), Vec2::new(50.0, 50.0)).unwrap();
        plan.add_wall(Segment::new(Vec2::new(4.0, -10.0), Vec2::new(4.0, 10.0)))
            .unwrap();
        plan
    }

    fn rover_prototype() -> BodyPrototype {
        BodyPrototype {
            name: "rover".into(),
            parts: vec![
                PartSpec::centred(PartKind::ContactSensor {
                    outline: smallvec![Segment::new(
                        Vec2::new(0.25, -0.25),
                        Vec2::new(0.25, 0.25)
                    )],
                }),
                PartSpec::centred(PartKind::DifferentialSteering {
                    axle_track: 0.5,
                    max_wheel_speed: 2.0,
                }),
                PartSpec::centred(PartKind::RangeSensor { max_range: 20.0 }),
            ],
        }
    }

    fn world_with_rover() -> (World, BodyId) {
        let mut world = World::new(Arc::new(plan_with_wall()));
        let proto = rover_prototype();
        let body = Body::from_prototype(
            BodyId(1),
            ClientId(1),
            &proto,
            Pose::default(),
            0.0,
        );
        let id = body.id();
        world.bodies.insert(id, body);
        (world, id)
    }

    #[test]
    fn differential_resolution_mixes_wheel_speeds() {
        let (world, id) = world_with_rover();
        let body = &world.bodies[&id];
        let v = resolve_differential(body, 1.0, 1.0).unwrap();
        assert_eq!(v.linear, 1.0);
        assert_eq!(v.turn_rate, 0.0);

        let v = resolve_differential(body, 0.0, 1.0).unwrap();
        assert_eq!(v.linear, 0.5);
        assert_eq!(v.turn_rate, 2.0);

        // Clamped to the wheel-speed limit.
        let v = resolve_differential(body, 100.0, 100.0).unwrap();
        assert_eq!(v.linear, 2.0);
    }

    #[test]
    fn missing_actuator_is_reported() {
        let (world, id) = world_with_rover();
        let body = &world.bodies[&id];
        assert!(matches!(
            resolve_ackerman(body, 1.0, 0.1),
            Err(RequestError::MissingActuator { .. })
        ));
        assert!(matches!(
            resolve_differential(body, f64::NAN, 0.0),
            Err(RequestError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn motion_toward_wall_is_truncated_at_contact() {
        let (mut world, id) = world_with_rover();
        let mut out = Outbox::new();
        let v = Velocities {
            linear: 1.0,
            turn_rate: 0.0,
        };
        let cfg = EngineConfig::default();
        let next = start_motion(&mut world, id, v, 0.0, &cfg, &mut out);
        assert!(next.is_some());

        // Bumper at x = 0.25 moving at 1 m/s toward the wall at x = 4:
        // contact at t = 3.75.
        let motion = world.bodies[&id].motion();
        assert!(motion.collided());
        assert!((motion.time1() - 3.75).abs() < 1e-9);

        // MotionStarted carries the truncated duration, and the contact
        // sensor reports clear at start.
        assert!(out.iter().any(|(_, e)| matches!(
            e,
            SimEvent::MotionStarted { duration, .. } if (duration - 3.75).abs() < 1e-9
        )));
        assert!(out.iter().any(|(_, e)| matches!(
            e,
            SimEvent::SensorChanged {
                value: SensorValue::Contact(false),
                ..
            }
        )));
    }

    #[test]
    fn zero_magnitude_request_is_an_immediate_null_motion() {
        let (mut world, id) = world_with_rover();
        let mut out = Outbox::new();
        let v = Velocities {
            linear: 0.0,
            turn_rate: 0.0,
        };
        let next = start_motion(&mut world, id, v, 5.0, &EngineConfig::default(), &mut out);
        assert!(next.is_none());
        assert!(world.bodies[&id].motion().is_null());
        assert!(out.iter().any(|(_, e)| matches!(
            e,
            SimEvent::MotionHalted {
                reason: HaltReason::Completed,
                duration,
                ..
            } if *duration == 0.0
        )));
    }

    #[test]
    fn overlapping_start_never_moves_and_reports_collision() {
        let (mut world, id) = world_with_rover();
        // Park the bumper exactly on the wall.
        let pose = Pose::new(Vec2::new(3.75, 0.0), 0.0);
        world
            .bodies
            .get_mut(&id)
            .unwrap()
            .set_motion(Motion::null_at(pose, 0.0));

        let mut out = Outbox::new();
        let v = Velocities {
            linear: 1.0,
            turn_rate: 0.0,
        };
        let next = start_motion(&mut world, id, v, 0.0, &EngineConfig::default(), &mut out);
        assert!(next.is_none());

        let body = &world.bodies[&id];
        assert!(body.motion().is_null());
        assert_eq!(body.pose_at(10.0), pose);
        assert!(out.iter().any(|(_, e)| matches!(
            e,
            SimEvent::MotionHalted {
                reason: HaltReason::Collision,
                duration,
                ..
            } if *duration == 0.0
        )));
        // Contact sensor edge-triggers to touching.
        assert!(out.iter().any(|(_, e)| matches!(
            e,
            SimEvent::SensorChanged {
                value: SensorValue::Contact(true),
                ..
            }
        )));
    }

    #[test]
    fn evaluate_steps_until_completion_and_halts_with_collision() {
        let (mut world, id) = world_with_rover();
        let cfg = EngineConfig::default();
        let mut out = Outbox::new();
        let v = Velocities {
            linear: 1.0,
            turn_rate: 0.0,
        };
        let mut due = start_motion(&mut world, id, v, 0.0, &cfg, &mut out).unwrap();

        // Drive the evaluation loop the way the motion task would.
        let mut guard = 0;
        loop {
            out.clear();
            match evaluate(&mut world, due.as_secs(), &cfg, &mut out) {
                Some(next) => {
                    assert!(next > due, "next step must advance");
                    due = next;
                }
                None => break,
            }
            guard += 1;
            assert!(guard < 100, "evaluation failed to terminate");
        }

        // Final pass emitted the collision halt at the wall, and the
        // body is at rest just short of x = 4.
        assert!(out.iter().any(|(_, e)| matches!(
            e,
            SimEvent::MotionHalted {
                reason: HaltReason::Collision,
                ..
            }
        )));
        let body = &world.bodies[&id];
        assert!(body.motion().is_null());
        assert!((body.pose_at(100.0).position.x - 3.75).abs() < 1e-6);
        assert!(!world.any_motion_in_progress(100.0));
    }

    #[test]
    fn range_sensor_changes_are_edge_filtered() {
        let (mut world, id) = world_with_rover();
        let mut out = Outbox::new();

        let World {
            plan,
            bodies,
            paint,
        } = &mut world;
        let body = bodies.get_mut(&id).unwrap();
        let pose = Pose::default();

        eval_step_sensors(body, &pose, plan, paint, &mut out);
        let first = out
            .iter()
            .filter(|(_, e)| matches!(e, SimEvent::SensorChanged { .. }))
            .count();
        assert!(first >= 1, "first evaluation reports the initial reading");

        // Same pose again: no change, no events.
        out.clear();
        eval_step_sensors(body, &pose, plan, paint, &mut out);
        assert!(out.is_empty(), "unchanged sensors must stay silent");
    }

    #[test]
    fn query_sensor_reports_even_when_unchanged() {
        let (mut world, _id) = world_with_rover();
        let (body, value) = query_sensor(&mut world, ClientId(1), PartId(2), 0.0).unwrap();
        assert_eq!(body, BodyId(1));
        // Wall at x = 4, sensor at the origin: range 4.
        assert!(matches!(value, SensorValue::Range(Some(d)) if (d - 4.0).abs() < 1e-9));

        // Asking again returns the same answer (no edge filtering).
        let (_, again) = query_sensor(&mut world, ClientId(1), PartId(2), 0.0).unwrap();
        assert_eq!(again, value);
    }

    #[test]
    fn query_sensor_rejects_bad_parts() {
        let (mut world, _id) = world_with_rover();
        assert!(matches!(
            query_sensor(&mut world, ClientId(1), PartId(42), 0.0),
            Err(RequestError::UnknownPart { .. })
        ));
        assert!(matches!(
            query_sensor(&mut world, ClientId(1), PartId(1), 0.0),
            Err(RequestError::NotASensor { .. })
        ));
        assert!(matches!(
            query_sensor(&mut world, ClientId(9), PartId(0), 0.0),
            Err(RequestError::NotPlaced)
        ));
    }

    #[test]
    fn target_sensor_sees_enabled_targets_in_aperture() {
        let mut plan =
            FloorPlan::new(Vec2::new(-50.0, -50.0), Vec2::new(50.0, 50.0)).unwrap();
        plan.add_target(Target {
            position: Vec2::new(3.0, 0.0),
            enabled: true,
        });
        plan.add_target(Target {
            position: Vec2::new(-3.0, 0.0),
            enabled: true,
        });
        let proto = BodyPrototype {
            name: "seeker".into(),
            parts: vec![PartSpec::centred(PartKind::TargetSensor {
                max_range: 10.0,
                aperture: std::f64::consts::FRAC_PI_2,
            })],
        };
        let mut world = World::new(Arc::new(plan));
        let body = Body::from_prototype(BodyId(1), ClientId(1), &proto, Pose::default(), 0.0);
        world.bodies.insert(body.id(), body);

        let (_, value) = query_sensor(&mut world, ClientId(1), PartId(0), 0.0).unwrap();
        // Only the target ahead is inside the aperture.
        match value {
            SensorValue::Target(Some(fix)) => {
                assert!((fix.range - 3.0).abs() < 1e-9);
                assert!(fix.bearing.abs() < 1e-9);
            }
            other => panic!("expected a target fix, got {other:?}"),
        }
    }

    #[test]
    fn halt_motion_stops_midway_with_requested_reason() {
        let (mut world, id) = world_with_rover();
        let cfg = EngineConfig::default();
        let mut out = Outbox::new();
        let v = Velocities {
            linear: 1.0,
            turn_rate: 0.0,
        };
        start_motion(&mut world, id, v, 0.0, &cfg, &mut out);

        out.clear();
        halt_motion(&mut world, ClientId(1), 2.0, &mut out);
        let body = &world.bodies[&id];
        assert!(body.motion().is_null());
        assert!((body.pose_at(10.0).position.x - 2.0).abs() < 1e-9);
        assert!(out.iter().any(|(_, e)| matches!(
            e,
            SimEvent::MotionHalted {
                reason: HaltReason::Requested,
                duration,
                ..
            } if (duration - 2.0).abs() < 1e-9
        )));
    }
}
