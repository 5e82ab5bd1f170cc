//! Append-only paint trails.

use std::sync::Arc;

use trundle_core::id::{BodyId, PaintBoxId, PartId};
use trundle_geom::Vec2;

/// Points per sealed trail segment.
pub const PAINT_SEGMENT_POINTS: usize = 256;

/// An append-only record of trail positions laid by one paint sensor.
///
/// The trail is stored as a list of *sealed* segments plus one *open*
/// tail. Sealed segments are `Arc<[Vec2]>` and immutable: once a
/// segment is published across the state exchange it is shared by
/// reference and never touched again — only the open tail, which has
/// never been shared, is ever copied. New points extend the open tail;
/// a full tail is sealed and a fresh one started.
#[derive(Clone, Debug)]
pub struct PaintBox {
    id: PaintBoxId,
    body: BodyId,
    part: PartId,
    sealed: Vec<Arc<[Vec2]>>,
    open: Vec<Vec2>,
}

impl PaintBox {
    /// A fresh, empty trail for one sensor on one body.
    pub fn new(id: PaintBoxId, body: BodyId, part: PartId) -> Self {
        Self {
            id,
            body,
            part,
            sealed: Vec::new(),
            open: Vec::with_capacity(PAINT_SEGMENT_POINTS),
        }
    }

    /// Trail id (the exchange's stable identity key).
    pub fn id(&self) -> PaintBoxId {
        self.id
    }

    /// The body that laid this trail. The trail survives the body.
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// The paint sensor that laid this trail.
    pub fn part(&self) -> PartId {
        self.part
    }

    /// Append a trail point, sealing the open tail when it fills.
    pub fn push(&mut self, point: Vec2) {
        self.open.push(point);
        if self.open.len() >= PAINT_SEGMENT_POINTS {
            let full = std::mem::replace(&mut self.open, Vec::with_capacity(PAINT_SEGMENT_POINTS));
            self.sealed.push(Arc::from(full));
        }
    }

    /// The most recently laid point, if any.
    pub fn last_point(&self) -> Option<Vec2> {
        self.open
            .last()
            .or_else(|| self.sealed.last().and_then(|s| s.last()))
            .copied()
    }

    /// Total number of trail points.
    pub fn len(&self) -> usize {
        self.sealed.iter().map(|s| s.len()).sum::<usize>() + self.open.len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.sealed.is_empty() && self.open.is_empty()
    }

    /// Sealed (immutable, shareable) trail segments.
    pub fn sealed(&self) -> &[Arc<[Vec2]>] {
        &self.sealed
    }

    /// The open (not yet shared) tail.
    pub fn open(&self) -> &[Vec2] {
        &self.open
    }
}
