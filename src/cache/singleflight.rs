//! Load Coalescing
//!
//! Collapses concurrent loads of the same key into a single upstream call.
//! The first caller for a key becomes the leader and drives the load itself;
//! callers arriving while it is in flight subscribe to the leader's result
//! and await it. The entry is dropped as soon as the leader finishes,
//! so the next miss triggers a fresh load.
//!
//! # Design
//!
//! - In-flight table: `parking_lot::Mutex<HashMap<key, watch::Receiver>>`,
//!   locked only to insert or remove an entry, never across an `.await`
//! - Each in-flight call is a `tokio::sync::watch` channel carrying
//!   `Option<Result<T>>`; the leader publishes exactly once
//! - If the leader is dropped mid-load its entry is removed and its waiters
//!   claim the key again; one of them becomes the new leader and runs its
//!   own load, so every caller still ends with a loader result

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::Result;

type Slot<T> = Option<Result<T>>;
type CallTable<T> = Mutex<HashMap<String, watch::Receiver<Slot<T>>>>;

enum Role<T> {
    Leader(watch::Sender<Slot<T>>),
    Follower(watch::Receiver<Slot<T>>),
}

/// Per-key in-flight call deduplicator
pub struct Coalescer<T> {
    calls: CallTable<T>,
    coalesced: AtomicU64,
}

impl<T: Clone> Coalescer<T> {
    /// Create an empty coalescer
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Run `load` for `key` unless a load for it is already in flight, in
    /// which case wait for and return that load's result.
    ///
    /// A waiter whose leader is dropped before publishing retries the claim
    /// and may end up running `load` itself.
    pub async fn run<F, Fut>(&self, key: &str, load: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut counted = false;

        loop {
            match self.claim(key) {
                Role::Leader(tx) => {
                    let _guard = CallGuard {
                        calls: &self.calls,
                        key,
                    };
                    let result = load().await;
                    tx.send_replace(Some(result.clone()));
                    return result;
                }
                Role::Follower(rx) => {
                    if !counted {
                        self.coalesced.fetch_add(1, Ordering::Relaxed);
                        counted = true;
                    }
                    match Self::wait(rx).await {
                        Some(result) => return result,
                        None => debug!(key, "In-flight load dropped, claiming again"),
                    }
                }
            }
        }
    }

    fn claim(&self, key: &str) -> Role<T> {
        let mut calls = self.calls.lock();
        match calls.get(key) {
            Some(rx) => Role::Follower(rx.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                calls.insert(key.to_string(), rx);
                Role::Leader(tx)
            }
        }
    }

    /// Leader's result, or `None` if the leader went away without one
    async fn wait(mut rx: watch::Receiver<Slot<T>>) -> Option<Result<T>> {
        match rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        }
    }

    /// Number of keys with a load in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of calls that were served by another caller's load
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl<T: Clone> Default for Coalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Coalescer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

/// Removes the leader's table entry when the leader finishes or is dropped
struct CallGuard<'a, T> {
    calls: &'a CallTable<T>,
    key: &'a str,
}

impl<T> Drop for CallGuard<'_, T> {
    fn drop(&mut self) {
        self.calls.lock().remove(self.key);
    }
}

// =============================================================================
// Tests
// =============================================================================
