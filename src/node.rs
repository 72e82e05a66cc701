//! The local DHT participant.
//!
//! [`LocalNode`] owns this node's identifier, its UDP socket and the
//! transaction bookkeeping that ties responses back to the queries that
//! caused them. Inbound datagrams are decoded and handed, synchronously and
//! in registration order, to per-kind handlers; one datagram's handler
//! chain finishes before the next datagram is looked at.

mod error;
mod events;
mod local;

pub use error::NodeError;
pub use events::Inbound;
pub use local::LocalNode;
