//! 160-bit identifiers and the XOR distance metric.
//!
//! A [`NodeId`] names a DHT participant; the same value space, reused as a
//! content key, is an [`InfoHash`]. Closeness between identifiers is the
//! Kademlia XOR metric: interpret the bitwise XOR of two ids as an unsigned
//! 160-bit integer and compare.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use sha1::{Digest, Sha1};
use thiserror::Error;

/// Identifier length in bytes.
pub const ID_LEN: usize = 20;

#[derive(Debug, Clone, Copy, Error)]
#[error("malformed 160-bit identifier")]
pub struct InvalidId;

/// A 160-bit DHT identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) [u8; ID_LEN]);

/// A content identifier. Same value space as [`NodeId`], keyed by torrent
/// info-hash instead of participant.
pub type InfoHash = NodeId;

impl NodeId {
    /// Generates a fresh identifier by hashing the current time together
    /// with random bytes.
    ///
    /// Good enough to avoid collisions inside the network; no stronger
    /// guarantee is intended.
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let mut hasher = Sha1::new();
        hasher.update(now.as_nanos().to_be_bytes());
        hasher.update(rand::random::<[u8; 8]>());
        NodeId(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidId> {
        let raw: [u8; ID_LEN] = bytes.try_into().map_err(|_| InvalidId)?;
        Ok(NodeId(raw))
    }

    /// Parses the canonical 40-character hex form.
    pub fn from_hex(hex: &str) -> Result<Self, InvalidId> {
        let hex = hex.as_bytes();
        if hex.len() != ID_LEN * 2 {
            return Err(InvalidId);
        }
        let mut raw = [0u8; ID_LEN];
        for (i, pair) in hex.chunks_exact(2).enumerate() {
            let hi = hex_val(pair[0]).ok_or(InvalidId)?;
            let lo = hex_val(pair[1]).ok_or(InvalidId)?;
            raw[i] = hi << 4 | lo;
        }
        Ok(NodeId(raw))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// XOR distance to `other`.
    pub fn distance(&self, other: &NodeId) -> Distance {
        let mut dist = [0u8; ID_LEN];
        for (i, d) in dist.iter_mut().enumerate() {
            *d = self.0[i] ^ other.0[i];
        }
        Distance(dist)
    }

    /// Builds the relay identifier toward `target`: the upper 4 bytes come
    /// from `target`, the remaining 16 stay ours.
    ///
    /// Presenting this id makes remote nodes file us near `target`, which
    /// pulls their get_peers and announce traffic our way. It never appears
    /// in any wire-format rule, only as a value we choose to present.
    pub fn relay(&self, target: &NodeId) -> NodeId {
        let mut id = self.0;
        id[..4].copy_from_slice(&target.0[..4]);
        NodeId(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NodeId({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// The XOR of two identifiers, ordered as an unsigned big-endian integer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Distance([u8; ID_LEN]);

impl Distance {
    pub const ZERO: Distance = Distance([0; ID_LEN]);

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Distance({})", self)
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "67cdcf5c6627c4c49345e943c19eb72e7eca9616";
    const ID_B: &str = "858d82c95d2794f78cbb4acd5857ff5ad33733af";

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = NodeId::from_hex(ID_A).unwrap();
        assert_eq!(a.distance(&a), Distance::ZERO);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = NodeId::from_hex(ID_A).unwrap();
        let b = NodeId::from_hex(ID_B).unwrap();
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn test_distance_reference_pair() {
        let a = NodeId::from_hex(ID_A).unwrap();
        let b = NodeId::from_hex(ID_B).unwrap();
        assert_eq!(
            a.distance(&b).to_string(),
            "e2404d953b0050331ffea38e99c94874adfda5b9"
        );
    }

    #[test]
    fn test_distance_orders_like_big_integers() {
        let origin = NodeId([0; ID_LEN]);
        let mut near = [0u8; ID_LEN];
        near[19] = 1;
        let mut far = [0u8; ID_LEN];
        far[0] = 1;
        assert!(origin.distance(&NodeId(near)) < origin.distance(&NodeId(far)));
    }

    #[test]
    fn test_relay_takes_target_prefix() {
        let a = NodeId::from_hex(ID_A).unwrap();
        let b = NodeId::from_hex(ID_B).unwrap();
        assert_eq!(
            a.relay(&b).to_string(),
            "858d82c96627c4c49345e943c19eb72e7eca9616"
        );
    }

    #[test]
    fn test_generate_is_distinct() {
        assert_ne!(NodeId::generate(), NodeId::generate());
    }

    #[test]
    fn test_hex_roundtrip() {
        let a = NodeId::from_hex(ID_A).unwrap();
        assert_eq!(a.to_string(), ID_A);
        assert_eq!(NodeId::from_bytes(a.as_bytes()).unwrap(), a);
    }

    #[test]
    fn test_malformed_hex_rejected() {
        assert!(NodeId::from_hex("1234").is_err());
        assert!(NodeId::from_hex(&"zz".repeat(20)).is_err());
        assert!(NodeId::from_bytes(&[0u8; 19]).is_err());
    }
}
