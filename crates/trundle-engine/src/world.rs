//! Mutable simulation state owned by the simulation thread.

use std::sync::Arc;

use indexmap::IndexMap;
use trundle_core::id::{BodyId, ClientId, PaintBoxId};
use trundle_model::{Body, FloorPlan, PaintBox};

/// Everything the simulation thread mutates: the body and paint
/// registries, plus the read-only floor plan.
///
/// `World` is moved into the simulation thread at session start and
/// never leaves it; tasks reach it through their context. The
/// registries are insertion-ordered and identity-keyed, which gives the
/// state exchange a stable key sequence on its fast path.
pub struct World {
    /// The static environment. Read-only after load.
    pub plan: Arc<FloorPlan>,
    /// Placed bodies by id.
    pub bodies: IndexMap<BodyId, Body>,
    /// Paint trails by id. Trails outlive their bodies.
    pub paint: IndexMap<PaintBoxId, PaintBox>,
}

impl World {
    /// An empty world over a plan.
    pub fn new(plan: Arc<FloorPlan>) -> Self {
        Self {
            plan,
            bodies: IndexMap::new(),
            paint: IndexMap::new(),
        }
    }

    /// The body owned by `client`, if it has placed one.
    pub fn body_by_owner(&self, client: ClientId) -> Option<&Body> {
        self.bodies.values().find(|b| b.owner() == client)
    }

    /// Mutable lookup of a client's body.
    pub fn body_by_owner_mut(&mut self, client: ClientId) -> Option<&mut Body> {
        self.bodies.values_mut().find(|b| b.owner() == client)
    }

    /// Remove a client's body, returning it. Paint stays on the floor.
    pub fn remove_body_of(&mut self, client: ClientId) -> Option<Body> {
        let id = self.body_by_owner(client)?.id();
        self.bodies.shift_remove(&id)
    }

    /// Whether any body has a motion still in progress at `now`.
    pub fn any_motion_in_progress(&self, now: f64) -> bool {
        self.bodies.values().any(|b| b.motion().in_progress(now))
    }
}
