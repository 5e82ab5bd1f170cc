//! Simulated bodies.

use smallvec::SmallVec;
use trundle_core::id::{BodyId, ClientId, PaintBoxId, PartId};
use trundle_geom::{Motion, Pose, Segment};

use crate::part::{Part, PartKind};
use crate::plan::BodyPrototype;

/// A simulated body: identity, ordered parts, and the motion currently
/// carrying it.
///
/// A body always holds exactly one [`Motion`]; a body at rest holds a
/// null motion at its pose. New movement replaces the motion — motions
/// are never mutated in place.
#[derive(Clone, Debug)]
pub struct Body {
    id: BodyId,
    owner: ClientId,
    name: String,
    parts: SmallVec<[Part; 4]>,
    motion: Motion,
    placed: bool,
    paint_box: Option<PaintBoxId>,
}

impl Body {
    /// Build a body from a prototype, at rest at `pose` at simulated
    /// time `time`.
    pub fn from_prototype(
        id: BodyId,
        owner: ClientId,
        prototype: &BodyPrototype,
        pose: Pose,
        time: f64,
    ) -> Self {
        Self {
            id,
            owner,
            name: prototype.name.clone(),
            parts: prototype.parts.iter().cloned().map(Part::new).collect(),
            motion: Motion::null_at(pose, time),
            placed: true,
            paint_box: None,
        }
    }

    /// Body id.
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Owning client (non-owning back-reference, resolved through the
    /// session's registries).
    pub fn owner(&self) -> ClientId {
        self.owner
    }

    /// Prototype name this body was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the body is placed in the plan.
    pub fn is_placed(&self) -> bool {
        self.placed
    }

    /// The current motion.
    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    /// Replace the current motion.
    pub fn set_motion(&mut self, motion: Motion) {
        self.motion = motion;
    }

    /// Pose at simulated time `t` under the current motion.
    pub fn pose_at(&self, t: f64) -> Pose {
        self.motion.pose_at(t)
    }

    /// The paint box recording this body's trail, if it has a paint
    /// sensor.
    pub fn paint_box(&self) -> Option<PaintBoxId> {
        self.paint_box
    }

    /// Link the body to its paint box (done once, at placement).
    pub fn set_paint_box(&mut self, id: PaintBoxId) {
        self.paint_box = Some(id);
    }

    /// Ordered parts.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Mutable access to the ordered parts (sensor state updates).
    pub fn parts_mut(&mut self) -> &mut [Part] {
        &mut self.parts
    }

    /// Look up a part by id (its position in the part list).
    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id.0 as usize)
    }

    /// Mutable part lookup.
    pub fn part_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.get_mut(id.0 as usize)
    }

    /// All contact-sensitive boundary segments, body frame, with each
    /// part's mount applied. This is the outline swept during collision
    /// tests.
    pub fn contact_outline(&self) -> Vec<Segment> {
        let mut out = Vec::new();
        for part in &self.parts {
            if let PartKind::ContactSensor { outline } = &part.spec.kind {
                for seg in outline {
                    out.push(seg.transformed(&part.spec.mount));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use trundle_core::id::{BodyId, ClientId};
    use trundle_geom::Vec2;

    use crate::part::PartSpec;

    fn prototype() -> BodyPrototype {
        BodyPrototype {
            name: "rover".into(),
            parts: vec![
                PartSpec::centred(PartKind::ContactSensor {
                    outline: smallvec![Segment::new(Vec2::new(0.2, -0.2), Vec2::new(0.2, 0.2))],
                }),
                PartSpec::centred(PartKind::RangeSensor { max_range: 5.0 }),
            ],
        }
    }

    #[test]
    fn built_body_is_at_rest_at_pose() {
        let pose = Pose::new(Vec2::new(1.0, 2.0), 0.5);
        let body = Body::from_prototype(BodyId(1), ClientId(1), &prototype(), pose, 3.0);
        assert!(body.motion().is_null());
        assert_eq!(body.pose_at(3.0), pose);
        assert_eq!(body.pose_at(100.0), pose);
    }

    #[test]
    fn part_lookup_is_positional() {
        let body = Body::from_prototype(
            BodyId(1),
            ClientId(1),
            &prototype(),
            Pose::default(),
            0.0,
        );
        assert!(matches!(
            body.part(PartId(1)).map(|p| &p.spec.kind),
            Some(PartKind::RangeSensor { .. })
        ));
        assert!(body.part(PartId(9)).is_none());
    }

    #[test]
    fn contact_outline_applies_mounts() {
        let proto = BodyPrototype {
            name: "rover".into(),
            parts: vec![PartSpec {
                kind: PartKind::ContactSensor {
                    outline: smallvec![Segment::new(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0))],
                },
                mount: Pose::new(Vec2::new(2.0, 0.0), 0.0),
            }],
        };
        let body = Body::from_prototype(BodyId(1), ClientId(1), &proto, Pose::default(), 0.0);
        let outline = body.contact_outline();
        assert_eq!(outline.len(), 1);
        assert!((outline[0].a - Vec2::new(2.0, -1.0)).length() < 1e-12);
    }
}
