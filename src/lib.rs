//! dht-sonar - a Mainline DHT crawler.
//!
//! A participant in the BitTorrent Kademlia DHT ([BEP-5]) built for
//! discovery rather than downloading: it walks the network outward from a
//! handful of bootstrap routers, remembers every node and peer it meets,
//! and surfaces the info-hashes other participants are asking about.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 wire serialization
//! - [`krpc`] - typed KRPC messages and compact record codecs
//! - [`id`] - 160-bit identifiers and XOR distance
//! - [`routing`] - bounded node/peer store
//! - [`node`] - the local participant: socket, transactions, dispatch
//! - [`crawler`] - the crawl engine and announce tokens
//! - [`constants`] - tuning parameters
//!
//! # Example
//!
//! ```no_run
//! use dht_sonar::{Crawler, NodeId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut crawler = Crawler::bind("0.0.0.0:6881".parse()?).await?;
//!     crawler.bootstrap_from_defaults().await;
//!
//!     let target = NodeId::from_hex("90289fd34dfc1cf8f316a268add8354c85334458")?;
//!     crawler.start(target);
//!     crawler.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! [BEP-5]: http://bittorrent.org/beps/bep_0005.html

pub mod bencode;
pub mod constants;
pub mod crawler;
pub mod id;
pub mod krpc;
pub mod node;
pub mod routing;

pub use bencode::{decode, encode, BencodeError, Value};
pub use crawler::{Crawler, TokenRotator};
pub use id::{Distance, InfoHash, InvalidId, NodeId};
pub use krpc::{
    KrpcError, Message, NodeRecord, PeerRecord, Query, QueryKind, Response, TransactionId,
};
pub use node::{Inbound, LocalNode, NodeError};
pub use routing::{RoutingStore, StoreStats};
