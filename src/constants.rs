//! Tuning parameters for the crawler.

use std::time::Duration;

/// Default UDP port for DHT traffic.
pub const DEFAULT_PORT: u16 = 6881;

/// Well-known bootstrap routers.
pub const BOOTSTRAP_NODES: &[&str] = &[
    "router.bittorrent.com:6881",
    "dht.transmissionbt.com:6881",
    "router.utorrent.com:6881",
];

/// Hard bound on stored node records, and separately on peer records.
pub const STORE_CAPACITY: usize = 65_535;

/// Nodes returned by a nearest-node lookup (Kademlia k).
pub const NEAREST_NODES_RETURNED: usize = 8;

/// Announce tokens rotate on this interval.
pub const TOKEN_ROTATE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// How long a sent query's transaction id stays acceptable.
pub const TRANSACTION_TTL: Duration = Duration::from_secs(15);

/// Expired transaction ids are swept on this interval.
pub const TRANSACTION_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Receive buffer, sized for the largest possible UDP payload.
pub const RECV_BUFFER_SIZE: usize = 65_535;
