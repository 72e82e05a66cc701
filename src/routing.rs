//! Bounded memory of the nodes and peers the crawl has seen.
//!
//! Deliberately not a k-bucket routing table: a crawler wants breadth, not
//! balanced coverage of its own id space, so the store is a flat
//! insertion-ordered sequence with a hard capacity. Records offered past
//! the bound are discarded.

use parking_lot::RwLock;

use crate::constants::{NEAREST_NODES_RETURNED, STORE_CAPACITY};
use crate::id::NodeId;
use crate::krpc::{NodeRecord, PeerRecord};

/// Read-only snapshot of the store's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub node_count: usize,
    pub peer_count: usize,
}

pub struct RoutingStore {
    capacity: usize,
    nodes: RwLock<Vec<NodeRecord>>,
    peers: RwLock<Vec<PeerRecord>>,
}

impl RoutingStore {
    pub fn new() -> Self {
        Self::with_capacity(STORE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            nodes: RwLock::new(Vec::new()),
            peers: RwLock::new(Vec::new()),
        }
    }

    /// Appends records while below capacity. No dedup here; compact-list
    /// decoding already collapsed duplicates within one response.
    pub fn add_nodes(&self, records: impl IntoIterator<Item = NodeRecord>) {
        let mut nodes = self.nodes.write();
        for record in records {
            if nodes.len() >= self.capacity {
                break;
            }
            nodes.push(record);
        }
    }

    pub fn add_peers(&self, records: impl IntoIterator<Item = PeerRecord>) {
        let mut peers = self.peers.write();
        for record in records {
            if peers.len() >= self.capacity {
                break;
            }
            peers.push(record);
        }
    }

    /// Up to eight known nodes, closest to `target` first by XOR distance.
    pub fn nearest_nodes(&self, target: &NodeId) -> Vec<NodeRecord> {
        let nodes = self.nodes.read();
        let mut ranked: Vec<(NodeRecord, _)> = nodes
            .iter()
            .map(|record| (*record, record.id.distance(target)))
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1));
        ranked.truncate(NEAREST_NODES_RETURNED);
        ranked.into_iter().map(|(record, _)| record).collect()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            node_count: self.nodes.read().len(),
            peer_count: self.peers.read().len(),
        }
    }

    pub fn peers(&self) -> Vec<PeerRecord> {
        self.peers.read().clone()
    }
}

impl Default for RoutingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use super::*;

    fn record(seed: u8) -> NodeRecord {
        NodeRecord::new(
            NodeId::from_bytes(&[seed; 20]).unwrap(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, seed)), 6881),
        )
    }

    #[test]
    fn test_add_nodes_respects_capacity() {
        let store = RoutingStore::with_capacity(3);
        store.add_nodes((0..10).map(record));
        assert_eq!(store.stats().node_count, 3);

        // Still full; later offers are discarded.
        store.add_nodes([record(42)]);
        assert_eq!(store.stats().node_count, 3);
    }

    #[test]
    fn test_add_peers_respects_capacity() {
        let store = RoutingStore::with_capacity(2);
        let peers = (0..5).map(|i| {
            PeerRecord::new(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, i)),
                6881,
            ))
        });
        store.add_peers(peers);
        assert_eq!(store.stats().peer_count, 2);
    }

    #[test]
    fn test_nearest_nodes_caps_at_eight() {
        let store = RoutingStore::new();
        store.add_nodes((0..20).map(record));

        let target = NodeId::from_bytes(&[0; 20]).unwrap();
        let nearest = store.nearest_nodes(&target);
        assert_eq!(nearest.len(), 8);
    }

    #[test]
    fn test_nearest_nodes_ranks_by_distance() {
        let store = RoutingStore::new();
        // Inserted far-to-near on purpose.
        store.add_nodes([record(200), record(50), record(3)]);

        let target = NodeId::from_bytes(&[0; 20]).unwrap();
        let nearest = store.nearest_nodes(&target);
        assert_eq!(nearest, vec![record(3), record(50), record(200)]);
    }

    #[test]
    fn test_nearest_nodes_only_returns_known_records() {
        let store = RoutingStore::new();
        store.add_nodes([record(1), record(2)]);

        let target = NodeId::generate();
        for found in store.nearest_nodes(&target) {
            assert!(found == record(1) || found == record(2));
        }
    }

    #[test]
    fn test_empty_store() {
        let store = RoutingStore::new();
        assert!(store.nearest_nodes(&NodeId::generate()).is_empty());
        assert_eq!(
            store.stats(),
            StoreStats {
                node_count: 0,
                peer_count: 0
            }
        );
    }
}
