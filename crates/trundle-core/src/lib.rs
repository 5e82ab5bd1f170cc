//! Core types for the Trundle robot simulator.
//!
//! This crate defines the fundamental vocabulary shared across the
//! workspace: strongly-typed identifiers, the simulated-time type, the
//! inbound [`Request`] surface, the outbound [`SimEvent`] surface, and
//! the shared error enums. It contains no scheduling or motion logic.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod event;
pub mod id;
pub mod request;
pub mod time;

pub use error::{DispatchError, RequestError};
pub use event::{HaltReason, SensorValue, SimEvent, TargetFix};
pub use id::{BodyId, ClientId, IdSource, InterlockToken, PaintBoxId, PartId, TaskId};
pub use request::{Request, RequestPayload};
pub use time::SimTime;
