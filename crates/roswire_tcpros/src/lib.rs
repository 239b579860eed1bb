//! roswire_tcpros
//!
//! The TCPROS node-to-node transport: connection-header negotiation,
//! service client/server, and topic publisher/subscriber links.
//!
//! Endpoints are addressed directly by URI (`rosrpc://host:port` for
//! services, `tcpros://host:port` for topics); master lookup is a layer
//! above this crate.

pub mod header;

mod message;
pub use message::{Message, ServicePair, ServiceResult};

pub mod wire;

mod client;
pub use client::{PendingResponse, ServiceClient};

mod service;
pub use service::ServiceServer;

mod publisher;
pub use publisher::{LinkEvent, Publisher};

mod subscriber;
pub use subscriber::{RawSubscriber, Subscriber, TopicInfo};

mod support;
pub use support::log_core_error;

// Re-export core types that transport users will commonly need
pub use roswire_core::error::{CoreError, Result};
pub use roswire_core::gate::PeerGate;
