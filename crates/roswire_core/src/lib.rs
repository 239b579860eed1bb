//! roswire_core: transport-free core of the roswire ROS1 client stack.
//!
//! Design goals:
//! - Pure, testable logic (no sockets, no async runtime).
//! - Explicit types over derive magic.
//! - Small, stable public API surface.

pub mod error;

/// ROS1 wire serialization (little-endian, length-prefixed).
pub mod codec;

/// Peer accounting shared between an endpoint and its wrappers.
pub mod gate;

/// ROS graph name validation and resolution.
pub mod naming;
