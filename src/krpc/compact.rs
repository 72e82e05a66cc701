use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::id::{NodeId, ID_LEN};

/// Compact node record: 20-byte id + 4-byte IPv4 + 2-byte port.
const NODE_RECORD_LEN: usize = ID_LEN + 6;
/// Compact peer record: 4-byte IPv4 + 2-byte port.
const PEER_RECORD_LEN: usize = 6;

/// A known DHT participant: identifier plus observed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRecord {
    pub id: NodeId,
    pub addr: SocketAddr,
}

impl NodeRecord {
    pub fn new(id: NodeId, addr: SocketAddr) -> Self {
        Self { id, addr }
    }

    /// Parses one 26-byte compact record.
    pub fn from_compact(data: &[u8]) -> Option<Self> {
        if data.len() != NODE_RECORD_LEN {
            return None;
        }
        let id = NodeId::from_bytes(&data[..ID_LEN]).ok()?;
        let ip = Ipv4Addr::new(data[20], data[21], data[22], data[23]);
        let port = u16::from_be_bytes([data[24], data[25]]);
        Some(Self::new(id, SocketAddr::new(IpAddr::V4(ip), port)))
    }

    /// Compact form; `None` for IPv6 addresses, which the format cannot
    /// carry.
    pub fn to_compact(&self) -> Option<[u8; NODE_RECORD_LEN]> {
        let SocketAddr::V4(v4) = self.addr else {
            return None;
        };
        let mut out = [0u8; NODE_RECORD_LEN];
        out[..ID_LEN].copy_from_slice(self.id.as_bytes());
        out[20..24].copy_from_slice(&v4.ip().octets());
        out[24..26].copy_from_slice(&v4.port().to_be_bytes());
        Some(out)
    }

    /// Decodes a concatenated record blob, 26 bytes per record.
    ///
    /// A trailing partial chunk is dropped silently, and records repeating
    /// an (id, ip, port) triple collapse to their first occurrence.
    pub fn decode_list(data: &[u8]) -> Vec<NodeRecord> {
        let mut seen = HashSet::new();
        data.chunks_exact(NODE_RECORD_LEN)
            .filter_map(Self::from_compact)
            .filter(|record| seen.insert(*record))
            .collect()
    }

    pub fn encode_list(records: &[NodeRecord]) -> Vec<u8> {
        let mut out = Vec::with_capacity(records.len() * NODE_RECORD_LEN);
        for record in records {
            if let Some(compact) = record.to_compact() {
                out.extend_from_slice(&compact);
            }
        }
        out
    }
}

/// An announced holder of content for some info-hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerRecord {
    pub addr: SocketAddr,
}

impl PeerRecord {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Parses one 6-byte compact record.
    pub fn from_compact(data: &[u8]) -> Option<Self> {
        if data.len() != PEER_RECORD_LEN {
            return None;
        }
        let ip = Ipv4Addr::new(data[0], data[1], data[2], data[3]);
        let port = u16::from_be_bytes([data[4], data[5]]);
        Some(Self::new(SocketAddr::new(IpAddr::V4(ip), port)))
    }

    pub fn to_compact(&self) -> Option<[u8; PEER_RECORD_LEN]> {
        let SocketAddr::V4(v4) = self.addr else {
            return None;
        };
        let mut out = [0u8; PEER_RECORD_LEN];
        out[..4].copy_from_slice(&v4.ip().octets());
        out[4..6].copy_from_slice(&v4.port().to_be_bytes());
        Some(out)
    }
}
