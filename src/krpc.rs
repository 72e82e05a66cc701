//! KRPC wire protocol ([BEP-5]).
//!
//! Every datagram is one bencoded dictionary with a transaction id (`t`), a
//! message type (`y`: query / response / error) and a type-specific body.
//! This module owns the typed [`Message`] model, its encode/decode boundary
//! and the compact binary record formats for nodes and peers.
//!
//! Identifiers travel as raw 20-byte strings on the wire and only become
//! hex at the logging boundary.
//!
//! [BEP-5]: http://bittorrent.org/beps/bep_0005.html

mod compact;
mod error;
mod message;

pub use compact::{NodeRecord, PeerRecord};
pub use error::KrpcError;
pub use message::{
    generate_transaction_id, AnnouncePeerQuery, AnnouncePeerResponse, ErrorMessage, FindNodeQuery,
    FindNodeResponse, Found, GetPeersQuery, GetPeersResponse, Message, Payload, PingQuery,
    PingResponse, Query, QueryKind, Response, TransactionId,
};
