//! In-flight request coalescing.
//!
//! Concurrent loads with identical cache keys share one transport request:
//! the first caller becomes the leader and holds a [`FlightGuard`]; later
//! callers get a completion receiver to await, then re-read cached state.
//! Entries carry a token so that a leader detached by invalidation cannot
//! clean up a successor's entry when its guard drops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use tether_wire::ResourceKey;

use crate::collection::QueryKey;

/// Key identifying one coalescable request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum FetchKey {
    /// A collection load (`find_all` / `load_related`).
    Query(QueryKey),
    /// A single-record fetch, qualified by its query encoding.
    Record { key: ResourceKey, query: String },
}

struct Pending {
    token: u64,
    receiver: watch::Receiver<bool>,
}

type PendingMap = Mutex<HashMap<FetchKey, Pending>>;

/// The outcome of [`InflightRegistry::join`].
pub(crate) enum Join {
    /// No request is in flight for the key; the caller performs it and
    /// drops the guard when done.
    Leader(FlightGuard),
    /// A request is already in flight; await the receiver, then re-read.
    Waiter(watch::Receiver<bool>),
}

pub(crate) struct InflightRegistry {
    next_token: AtomicU64,
    pending: Arc<PendingMap>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self {
            next_token: AtomicU64::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the in-flight request for `key`, or become its leader.
    pub fn join(&self, key: FetchKey) -> Join {
        let mut pending = self.pending.lock().expect("registry lock poisoned");
        if let Some(entry) = pending.get(&key) {
            return Join::Waiter(entry.receiver.clone());
        }
        let (sender, receiver) = watch::channel(false);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        pending.insert(key.clone(), Pending { token, receiver });
        Join::Leader(FlightGuard {
            pending: Arc::clone(&self.pending),
            key,
            token,
            sender,
        })
    }

    /// Detach any in-flight request for `key`: the next `join` leads a
    /// fresh request instead of waiting on the detached one.
    pub fn forget(&self, key: &FetchKey) {
        self.pending.lock().expect("registry lock poisoned").remove(key);
    }

    /// Drop every entry (store teardown).
    pub fn reset(&self) {
        self.pending.lock().expect("registry lock poisoned").clear();
    }
}

/// Held by the leader for the duration of its request. Dropping it wakes
/// all waiters and releases the key -- also on panic or cancellation.
pub(crate) struct FlightGuard {
    pending: Arc<PendingMap>,
    key: FetchKey,
    token: u64,
    sender: watch::Sender<bool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().expect("registry lock poisoned");
        if pending.get(&self.key).is_some_and(|entry| entry.token == self.token) {
            pending.remove(&self.key);
        }
        drop(pending);
        let _ = self.sender.send(true);
    }
}
