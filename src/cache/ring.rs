//! Consistent-Hash Ownership Ring
//!
//! Maps a key to the peer that owns it. Every physical peer is placed on the
//! ring `replicas` times; virtual node `i` of peer `p` sits at
//! `hash(format!("{i}{p}"))`. A key is owned by the first virtual node at or
//! after `hash(key)`, wrapping around to the smallest position.
//!
//! # Design
//!
//! - Sorted `Vec<u32>` of positions with binary search for lookup
//! - Reverse index position -> peer
//! - Pluggable hash function, CRC-32C by default

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Hash function placing keys and virtual nodes on the ring
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Default ring hash (CRC-32C)
pub fn default_hash() -> HashFn {
    Arc::new(crc32c::crc32c)
}

/// Consistent-hash ring of peers
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Strictly sorted virtual node positions
    positions: Vec<u32>,
    /// Position -> owning peer
    owners: HashMap<u32, String>,
}

impl HashRing {
    /// Create an empty ring with `replicas` virtual nodes per peer.
    ///
    /// Passing `None` for `hash` selects [`default_hash`].
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            hash: hash.unwrap_or_else(default_hash),
            replicas,
            positions: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// Replace the whole peer set and rebuild the ring
    pub fn configure<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.positions.clear();
        self.owners.clear();
        self.add(peers);
    }

    /// Add peers to the ring, keeping existing positions.
    ///
    /// If two virtual nodes collide on the same position, the one placed
    /// first keeps it.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let position = (self.hash)(format!("{}{}", i, peer).as_bytes());
                if let std::collections::hash_map::Entry::Vacant(slot) =
                    self.owners.entry(position)
                {
                    slot.insert(peer.to_string());
                    self.positions.push(position);
                }
            }
        }
        self.positions.sort_unstable();
    }

    /// Peer owning `key`, or `None` if the ring is empty
    pub fn owner(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.positions.partition_point(|&p| p < hash);
        // Past the largest position: wrap to the smallest.
        let position = self.positions[idx % self.positions.len()];

        self.owners.get(&position).map(String::as_str)
    }

    /// Number of virtual nodes on the ring
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the ring has no peers
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Virtual nodes per peer
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Sorted virtual node positions
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.positions.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
