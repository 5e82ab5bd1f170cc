//! Error types shared across the simulator core.
//!
//! The error taxonomy distinguishes misuse that degrades to a logged
//! no-op (queue double-add, malformed requests) from unrecoverable
//! startup failures surfaced to the embedder. Geometric degeneracies
//! are not errors at all — they resolve inside the geometry kernels.

use std::error::Error;
use std::fmt;

use crate::id::{ClientId, PartId};

/// Error submitting a request to a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchError {
    /// The session has shut down; its scheduler accepts no more tasks.
    Shutdown,
    /// The client is not connected (never was, or already disconnected).
    UnknownClient {
        /// The unrecognized client.
        client: ClientId,
    },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "session has shut down"),
            Self::UnknownClient { client } => write!(f, "unknown {client}"),
        }
    }
}

impl Error for DispatchError {}

/// Why a request degraded to a no-op during processing.
///
/// These are logged, never fatal: a misbehaving remote client must not
/// be able to crash the shared simulation.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestError {
    /// The client has no placed body but the request needs one.
    NotPlaced,
    /// The client already has a placed body.
    AlreadyPlaced,
    /// The named body prototype does not exist in the floor plan.
    UnknownPrototype {
        /// The name that failed to resolve.
        name: String,
    },
    /// The requested pose is outside the plan bounds or intersects a
    /// wall.
    InvalidPlacement,
    /// The part id does not resolve on the client's body.
    UnknownPart {
        /// The unrecognized part.
        part: PartId,
    },
    /// The part exists but is not a sensor.
    NotASensor {
        /// The offending part.
        part: PartId,
    },
    /// The body carries no steering part matching the request.
    MissingActuator {
        /// The steering kind the request needed.
        wanted: &'static str,
    },
    /// A numeric parameter is NaN, infinite, or out of range.
    InvalidParameter {
        /// Which parameter was rejected.
        what: &'static str,
    },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPlaced => write!(f, "client has no placed body"),
            Self::AlreadyPlaced => write!(f, "client already has a placed body"),
            Self::UnknownPrototype { name } => write!(f, "unknown body prototype '{name}'"),
            Self::InvalidPlacement => write!(f, "placement pose rejected"),
            Self::UnknownPart { part } => write!(f, "unknown {part}"),
            Self::NotASensor { part } => write!(f, "{part} is not a sensor"),
            Self::MissingActuator { wanted } => write!(f, "body has no {wanted} part"),
            Self::InvalidParameter { what } => write!(f, "invalid parameter: {what}"),
        }
    }
}

impl Error for RequestError {}
