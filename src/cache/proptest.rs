//! Property-Based Tests for the Store and the Ring
//!
//! # Test Properties
//!
//! 1. **Capacity**: `used_bytes <= capacity` after every `add`
//! 2. **LRU order**: the store evicts exactly what a reference recency list evicts
//! 3. **Ring determinism**: every key has one stable owner from the peer set
//! 4. **Remap bound**: adding a peer only moves keys to the new peer

#![cfg(test)]

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use super::byteview::ByteView;
use super::ring::HashRing;
use super::store::LruStore;

// =============================================================================
// Property Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Get(u8),
    Add(u8, usize),
}

/// Operations over a small key space so hits, overwrites and evictions all occur
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8).prop_map(Op::Get),
        (0u8..8, 0usize..24).prop_map(|(k, len)| Op::Add(k, len)),
    ]
}

fn peer_set_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z]{1,8}", 1..6).prop_map(|set| set.into_iter().collect())
}

fn key_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Za-z0-9]{1,12}", 1..50)
}

/// Reference LRU: most recently used entry last
struct ModelLru {
    capacity: u64,
    order: Vec<(String, u64)>,
}

impl ModelLru {
    fn used(&self) -> u64 {
        self.order.iter().map(|(_, size)| size).sum()
    }

    fn get(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|(k, _)| k == key) {
            let entry = self.order.remove(pos);
            self.order.push(entry);
        }
    }

    fn add(&mut self, key: &str, size: u64) {
        if let Some(pos) = self.order.iter().position(|(k, _)| k == key) {
            self.order.remove(pos);
        }
        self.order.push((key.to_string(), size));
        while self.capacity != 0 && self.used() > self.capacity && !self.order.is_empty() {
            self.order.remove(0);
        }
    }
}

// =============================================================================
// Store Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_store_matches_reference_lru(
        capacity in 0u64..64,
        ops in prop::collection::vec(op_strategy(), 1..100),
    ) {
        let mut store = LruStore::new(capacity);
        let mut model = ModelLru { capacity, order: Vec::new() };

        for op in ops {
            match op {
                Op::Get(k) => {
                    let key = format!("k{}", k);
                    store.get(&key);
                    model.get(&key);
                }
                Op::Add(k, len) => {
                    let key = format!("k{}", k);
                    let size = (key.len() + len) as u64;
                    store.add(key.clone(), ByteView::from(vec![b'v'; len]));
                    model.add(&key, size);

                    if capacity != 0 {
                        prop_assert!(store.used_bytes() <= capacity);
                    }
                }
            }

            prop_assert_eq!(store.used_bytes(), model.used());
            prop_assert_eq!(store.len(), model.order.len());
        }

        for (key, _) in &model.order {
            prop_assert!(store.contains(key));
        }
    }
}

// =============================================================================
// Ring Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_ring_owner_is_stable_member(
        peers in peer_set_strategy(),
        keys in key_strategy(),
        replicas in 1usize..20,
    ) {
        let mut ring = HashRing::new(replicas, None);
        ring.configure(&peers);

        prop_assert!(ring.positions().windows(2).all(|w| w[0] < w[1]));

        let members: HashSet<&str> = peers.iter().map(String::as_str).collect();
        for key in &keys {
            let owner = ring.owner(key);
            prop_assert!(owner.is_some());
            prop_assert!(members.contains(owner.unwrap()));
            prop_assert_eq!(owner, ring.owner(key));
        }
    }

    #[test]
    fn prop_adding_peer_only_moves_keys_to_it(
        peers in peer_set_strategy(),
        keys in key_strategy(),
    ) {
        let newcomer = "newcomer-peer".to_string();
        let mut ring = HashRing::new(10, None);
        ring.configure(&peers);

        let before: HashMap<&String, String> = keys
            .iter()
            .map(|k| (k, ring.owner(k).unwrap().to_string()))
            .collect();

        ring.add([&newcomer]);

        for key in &keys {
            let after = ring.owner(key).unwrap();
            prop_assert!(after == before[key] || after == newcomer);
        }
    }
}
