//! Trundle: a networked, time-driven robot simulator core.
//!
//! This is the top-level facade crate re-exporting the public API from
//! the Trundle sub-crates. For most users, adding `trundle` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use trundle::prelude::*;
//!
//! // A plan with one wall, one target, and a rover prototype.
//! let mut plan = FloorPlan::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0)).unwrap();
//! plan.add_wall(Segment::new(Vec2::new(5.0, -10.0), Vec2::new(5.0, 10.0))).unwrap();
//! plan.add_prototype(BodyPrototype {
//!     name: "rover".into(),
//!     parts: vec![PartSpec::centred(PartKind::DifferentialSteering {
//!         axle_track: 0.5,
//!         max_wheel_speed: 2.0,
//!     })],
//! }).unwrap();
//!
//! // Bring up a session, connect a client, place its body.
//! let mut session = Session::new(plan, EngineConfig::default()).unwrap();
//! let (client, events) = session.connect();
//! session.submit(client, Request::new(RequestPayload::Place {
//!     prototype: "rover".into(),
//!     pose: Pose::default(),
//! })).unwrap();
//! session.start_clock();
//!
//! match events.recv().unwrap() {
//!     SimEvent::PlacementResult { body, .. } => assert!(body.is_some()),
//!     other => panic!("unexpected event {other:?}"),
//! }
//! session.shutdown();
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `trundle-core` | IDs, simulated time, requests, events, errors |
//! | [`geom`] | `trundle-geom` | Vectors, poses, segments, motions, swept collision |
//! | [`model`] | `trundle-model` | Floor plans, bodies, parts, paint trails |
//! | [`engine`] | `trundle-engine` | Task queue, scheduler, motion engine, exchange, session |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, ids, requests, and events (`trundle-core`).
pub use trundle_core as types;

/// Geometry and motion kernels (`trundle-geom`).
pub use trundle_geom as geom;

/// Floor plans, bodies, parts, and paint trails (`trundle-model`).
pub use trundle_model as model;

/// Scheduling, motion, state exchange, and sessions (`trundle-engine`).
pub use trundle_engine as engine;

/// The types most embedders need, in one import.
pub mod prelude {
    pub use trundle_core::{
        BodyId, ClientId, DispatchError, HaltReason, InterlockToken, PaintBoxId, PartId, Request,
        RequestPayload, SensorValue, SimEvent, SimTime, TaskId,
    };
    pub use trundle_engine::{
        ConfigError, EngineConfig, SceneView, Scheduler, Session, StateExchange, TaskQueue,
    };
    pub use trundle_geom::{Motion, Pose, Segment, Vec2};
    pub use trundle_model::{Body, BodyPrototype, FloorPlan, PaintBox, PartKind, PartSpec, Target};
}
