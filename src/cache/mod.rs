//! Peer-Aware Read-Through Cache
//!
//! Every process runs a cache node. A node serves reads from a bounded local
//! store; on a miss it either loads from the application's data source or
//! forwards the request to the peer that owns the key, and it collapses
//! concurrent duplicate loads into one upstream call.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Registry                                │
//! │                 name ──▶ Group (namespace)                           │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  Group                                                               │
//! │  ┌────────────┐   miss   ┌────────────┐  remote  ┌────────────────┐  │
//! │  │  LruStore  │ ───────▶ │ Coalescer  │ ───────▶ │  PeerRouter    │  │
//! │  │ (ByteView) │          │ (per key)  │          │  (HashRing)    │  │
//! │  └────────────┘          └────────────┘          └────────────────┘  │
//! │         ▲                      │ local                               │
//! │         └──── populate ◀── Loader                                    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Sharding
//!
//! Ownership is computed locally from a shared, static peer list. A node
//! stores only values it loaded itself, so each key is cached on exactly one
//! node: its owner.

mod byteview;
mod group;
mod metrics;
mod peers;
mod registry;
mod ring;
mod singleflight;
mod store;

#[cfg(test)]
mod proptest;

pub use byteview::ByteView;
pub use group::{Group, Loader, LoaderFn};
pub use metrics::{GroupMetrics, GroupStats};
pub use peers::{PeerConnector, PeerFetcher, PeerPicker, PeerRouter, RouterConfig};
pub use registry::Registry;
pub use ring::{default_hash, HashFn, HashRing};
pub use singleflight::Coalescer;
pub use store::{EvictionCallback, LruStore, StoreStats, Weighted};

/// Default virtual nodes per peer on the hash ring
pub const DEFAULT_REPLICAS: usize = 50;

/// Default URL path prefix for peer requests
pub const DEFAULT_BASE_PATH: &str = "/_geecache/";

/// Default namespace capacity (2KB)
pub const DEFAULT_CACHE_BYTES: u64 = 2 << 10;
