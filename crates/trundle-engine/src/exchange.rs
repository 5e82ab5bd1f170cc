//! Double-buffered state hand-off between the simulation thread and
//! reader (render) threads.
//!
//! `store` and `retrieve` each run under one exchange-wide critical
//! section and reconcile bodies and paint boxes independently, matched
//! by stable identity key:
//!
//! 1. empty destination → deep-copy every source element;
//! 2. identical key sequence → update each destination element's
//!    mutable fields **in place** (the common fast path — consumers
//!    holding references keep their objects);
//! 3. anything else → rebuild the destination list, relinking matched
//!    elements, copying new ones, dropping the rest.
//!
//! Sealed paint segments obey the geometry contract: once published
//! across the boundary they are immutable and travel by `Arc` clone —
//! only the open, never-yet-shared tail is copied.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use trundle_core::id::{BodyId, PaintBoxId};
use trundle_core::time::SimTime;
use trundle_geom::{Pose, Vec2};
use trundle_model::{Body, PaintBox};

use crate::world::World;

/// Renderable state of one body.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyView {
    /// Stable identity key.
    pub id: BodyId,
    /// Prototype name (identity field, not updated in place).
    pub name: String,
    /// Current pose.
    pub pose: Pose,
    /// Whether the body is placed in the plan.
    pub placed: bool,
    /// Whether a motion is in progress.
    pub moving: bool,
}

/// Renderable state of one paint trail.
#[derive(Clone, Debug, PartialEq)]
pub struct PaintView {
    /// Stable identity key.
    pub id: PaintBoxId,
    /// The body that laid the trail.
    pub body: BodyId,
    /// Published, immutable trail segments (shared by reference).
    pub sealed: Vec<Arc<[Vec2]>>,
    /// The open tail (copied on every store).
    pub open: Vec<Vec2>,
}

/// A consistent snapshot of renderable simulation state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneView {
    /// Simulated time the snapshot was taken at.
    pub sim_time: SimTime,
    /// Bodies, in registry order.
    pub bodies: Vec<BodyView>,
    /// Paint trails, in registry order.
    pub paint: Vec<PaintView>,
}

impl SceneView {
    /// Refill this view from the world, reusing buffers.
    pub fn capture_from(&mut self, world: &World, now: SimTime) {
        self.sim_time = now;
        reconcile(
            &mut self.bodies,
            world.bodies.values().map(|b| body_view(b, now)),
        );
        reconcile(&mut self.paint, world.paint.values().map(paint_view));
    }
}

fn body_view(body: &Body, now: SimTime) -> BodyView {
    BodyView {
        id: body.id(),
        name: body.name().to_string(),
        pose: body.pose_at(now.as_secs()),
        placed: body.is_placed(),
        moving: body.motion().in_progress(now.as_secs()),
    }
}

fn paint_view(pb: &PaintBox) -> PaintView {
    PaintView {
        id: pb.id(),
        body: pb.body(),
        sealed: pb.sealed().to_vec(),
        open: pb.open().to_vec(),
    }
}

/// An element that can take part in keyed reconciliation.
trait Reconcile: Clone {
    type Key: Copy + Eq + Hash;

    /// Stable identity key.
    fn key(&self) -> Self::Key;

    /// Copy the mutable fields from `src`, preserving this element's
    /// identity.
    fn update_from(&mut self, src: &Self);
}

impl Reconcile for BodyView {
    type Key = BodyId;

    fn key(&self) -> BodyId {
        self.id
    }

    fn update_from(&mut self, src: &Self) {
        self.pose = src.pose;
        self.placed = src.placed;
        self.moving = src.moving;
    }
}

impl Reconcile for PaintView {
    type Key = PaintBoxId;

    fn key(&self) -> PaintBoxId {
        self.id
    }

    fn update_from(&mut self, src: &Self) {
        // Sealed segments relink by Arc clone — published trail data is
        // immutable and never deep-copied on this path.
        self.sealed.clone_from(&src.sealed);
        self.open.clone_from(&src.open);
    }
}

/// Keyed reconciliation of a destination list against a source
/// sequence. See the module docs for the three cases.
fn reconcile<T, I>(dest: &mut Vec<T>, src: I)
where
    T: Reconcile,
    I: Iterator<Item = T> + Clone,
{
    if dest.is_empty() {
        dest.extend(src);
        return;
    }

    let same_keys = {
        let mut keys = src.clone().map(|e| e.key());
        dest.len() == src.clone().count() && dest.iter().all(|d| keys.next() == Some(d.key()))
    };
    if same_keys {
        for (d, s) in dest.iter_mut().zip(src) {
            d.update_from(&s);
        }
        return;
    }

    // Key sets diverged: rebuild, relinking what survives.
    let mut old: HashMap<T::Key, T> = dest.drain(..).map(|e| (e.key(), e)).collect();
    for s in src {
        match old.remove(&s.key()) {
            Some(mut kept) => {
                kept.update_from(&s);
                dest.push(kept);
            }
            None => dest.push(s),
        }
    }
    // Destination elements with no source match are dropped with `old`.
}

/// The hand-off slot between the simulation thread and readers.
///
/// The writer publishes with [`store`](Self::store) (or the
/// rate-limited [`offer`](Self::offer)); readers pull a consistent copy
/// with [`retrieve`](Self::retrieve) into a view they own. Neither side
/// ever blocks for the duration of a render pass — only for the
/// reconciliation itself.
pub struct StateExchange {
    slot: Mutex<SceneView>,
    /// Minimum real time between accepted offers.
    min_interval: Duration,
    last_store: Mutex<Option<Instant>>,
}

// Compile-time assertion: StateExchange must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<StateExchange>();
};

impl StateExchange {
    /// Create an exchange with the given minimum inter-frame interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            slot: Mutex::new(SceneView::default()),
            min_interval,
            last_store: Mutex::new(None),
        }
    }

    /// Publish `source` into the slot, reconciling in place.
    pub fn store(&self, source: &SceneView) {
        let mut slot = self.slot.lock().unwrap();
        slot.sim_time = source.sim_time;
        reconcile(&mut slot.bodies, source.bodies.iter().cloned());
        reconcile(&mut slot.paint, source.paint.iter().cloned());
        *self.last_store.lock().unwrap() = Some(Instant::now());
    }

    /// Publish `source` unless the previous store was less than the
    /// minimum inter-frame interval ago. There is no backpressure from
    /// slow consumers — early offers are silently skipped. Returns
    /// whether the snapshot was stored.
    pub fn offer(&self, source: &SceneView) -> bool {
        {
            let last = self.last_store.lock().unwrap();
            if let Some(at) = *last {
                if at.elapsed() < self.min_interval {
                    return false;
                }
            }
        }
        self.store(source);
        true
    }

    /// Reconcile the published state into `dest`, preserving the
    /// identity of destination elements wherever keys match.
    pub fn retrieve(&self, dest: &mut SceneView) {
        let slot = self.slot.lock().unwrap();
        dest.sim_time = slot.sim_time;
        reconcile(&mut dest.bodies, slot.bodies.iter().cloned());
        reconcile(&mut dest.paint, slot.paint.iter().cloned());
    }
}
