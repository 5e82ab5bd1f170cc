//! The static floor plan: walls, bounds, targets, and body prototypes.

use std::error::Error;
use std::fmt;

use trundle_geom::{Segment, Vec2};

use crate::part::PartSpec;

/// A point target (beacon) that target sensors can detect.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    /// World position.
    pub position: Vec2,
    /// Disabled targets are invisible to sensors.
    pub enabled: bool,
}

/// The static definition of a body: its name and ordered part list.
/// Clients place bodies by prototype name.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyPrototype {
    /// Prototype name, unique within a plan.
    pub name: String,
    /// Ordered parts; part ids are positions in this list.
    pub parts: Vec<PartSpec>,
}

/// Errors building a floor plan.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanError {
    /// The bounds rectangle has non-positive width or height.
    EmptyBounds,
    /// A wall segment endpoint lies outside the plan bounds.
    WallOutOfBounds {
        /// The offending wall.
        wall: Segment,
    },
    /// Two prototypes share a name.
    DuplicatePrototype {
        /// The repeated name.
        name: String,
    },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBounds => write!(f, "plan bounds have non-positive extent"),
            Self::WallOutOfBounds { wall } => write!(f, "wall {wall} outside plan bounds"),
            Self::DuplicatePrototype { name } => write!(f, "duplicate body prototype '{name}'"),
        }
    }
}

impl Error for PlanError {}

/// The static environment model.
///
/// Built by an external plan loader, then handed to the session and
/// treated as read-only: all mutators take `&mut self`, so a plan
/// behind an `Arc` is frozen.
///
/// # Examples
///
/// ```
/// use trundle_geom::{Segment, Vec2};
/// use trundle_model::FloorPlan;
///
/// let mut plan = FloorPlan::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0)).unwrap();
/// plan.add_wall(Segment::new(Vec2::new(5.0, 0.0), Vec2::new(5.0, 10.0))).unwrap();
/// assert_eq!(plan.walls().len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct FloorPlan {
    min: Vec2,
    max: Vec2,
    walls: Vec<Segment>,
    targets: Vec<Target>,
    prototypes: Vec<BodyPrototype>,
}

impl FloorPlan {
    /// Create an empty plan with the given bounds rectangle.
    pub fn new(min: Vec2, max: Vec2) -> Result<Self, PlanError> {
        if max.x - min.x <= 0.0 || max.y - min.y <= 0.0 {
            return Err(PlanError::EmptyBounds);
        }
        Ok(Self {
            min,
            max,
            walls: Vec::new(),
            targets: Vec::new(),
            prototypes: Vec::new(),
        })
    }

    /// Add a wall segment. Both endpoints must lie inside the bounds.
    pub fn add_wall(&mut self, wall: Segment) -> Result<(), PlanError> {
        if !self.contains(wall.a) || !self.contains(wall.b) {
            return Err(PlanError::WallOutOfBounds { wall });
        }
        self.walls.push(wall);
        Ok(())
    }

    /// Add a point target.
    pub fn add_target(&mut self, target: Target) {
        self.targets.push(target);
    }

    /// Register a body prototype. Names must be unique.
    pub fn add_prototype(&mut self, prototype: BodyPrototype) -> Result<(), PlanError> {
        if self.prototypes.iter().any(|p| p.name == prototype.name) {
            return Err(PlanError::DuplicatePrototype {
                name: prototype.name,
            });
        }
        self.prototypes.push(prototype);
        Ok(())
    }

    /// Lower-left corner of the bounds.
    pub fn min(&self) -> Vec2 {
        self.min
    }

    /// Upper-right corner of the bounds.
    pub fn max(&self) -> Vec2 {
        self.max
    }

    /// Whether a point lies inside the bounds (inclusive).
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// All wall segments.
    pub fn walls(&self) -> &[Segment] {
        &self.walls
    }

    /// All targets.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Look up a prototype by name.
    pub fn prototype(&self, name: &str) -> Option<&BodyPrototype> {
        self.prototypes.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_bounds_are_rejected() {
        assert_eq!(
            FloorPlan::new(Vec2::ZERO, Vec2::new(0.0, 5.0)),
            Err(PlanError::EmptyBounds)
        );
    }

    #[test]
    fn walls_outside_bounds_are_rejected() {
        let mut plan = FloorPlan::new(Vec2::ZERO, Vec2::new(5.0, 5.0)).unwrap();
        let wall = Segment::new(Vec2::new(1.0, 1.0), Vec2::new(9.0, 1.0));
        assert!(matches!(
            plan.add_wall(wall),
            Err(PlanError::WallOutOfBounds { .. })
        ));
    }

    #[test]
    fn duplicate_prototype_names_are_rejected() {
        let mut plan = FloorPlan::new(Vec2::ZERO, Vec2::new(5.0, 5.0)).unwrap();
        plan.add_prototype(BodyPrototype {
            name: "rover".into(),
            parts: vec![],
        })
        .unwrap();
        assert!(matches!(
            plan.add_prototype(BodyPrototype {
                name: "rover".into(),
                parts: vec![],
            }),
            Err(PlanError::DuplicatePrototype { .. })
        ));
    }

    #[test]
    fn prototype_lookup_by_name() {
        let mut plan = FloorPlan::new(Vec2::ZERO, Vec2::new(5.0, 5.0)).unwrap();
        plan.add_prototype(BodyPrototype {
            name: "rover".into(),
            parts: vec![],
        })
        .unwrap();
        assert!(plan.prototype("rover").is_some());
        assert!(plan.prototype("tank").is_none());
    }
}
