//! Change notification hub.
//!
//! Every mutation the store performs emits a [`ChangeEvent`] scoped to
//! exactly the record or collection that changed -- never a global
//! "everything changed" broadcast. Events carry no payload: the contract
//! with the rendering layer is invalidate-and-re-read, so a listener
//! re-reads current state synchronously when notified.

use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::trace;

use tether_wire::ResourceKey;

use crate::collection::QueryKey;

/// What changed: one record or one collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Record(ResourceKey),
    Collection(QueryKey),
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record(key) => write!(f, "record {key}"),
            Self::Collection(key) => write!(f, "collection {key}"),
        }
    }
}

/// A single change notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub scope: Scope,
}

/// What a subscriber wants to hear about.
#[derive(Clone, Debug, Default)]
pub enum Interest {
    /// Every change in the store.
    #[default]
    All,
    /// Changes to one record.
    Record(ResourceKey),
    /// Changes to one collection query state.
    Collection(QueryKey),
}

impl Interest {
    /// Returns `true` if the given event matches this interest.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            Self::All => true,
            Self::Record(key) => event.scope == Scope::Record(key.clone()),
            Self::Collection(key) => event.scope == Scope::Collection(key.clone()),
        }
    }
}

/// A broadcast channel receiver for change events.
pub type ChangeStream = broadcast::Receiver<ChangeEvent>;

/// Internal subscriber: an interest paired with a broadcast sender.
struct Subscriber {
    interest: Interest,
    sender: broadcast::Sender<ChangeEvent>,
}

/// Fan-out hub that delivers change events to matching subscribers.
///
/// Subscribers whose channels are closed are pruned while routing.
pub struct ChangeHub {
    subscribers: RwLock<Vec<Subscriber>>,
    capacity: usize,
}

impl ChangeHub {
    /// Create a hub whose per-subscriber channels hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity,
        }
    }

    /// Register a new subscriber with the given interest.
    pub fn subscribe(&self, interest: Interest) -> ChangeStream {
        let (tx, rx) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .expect("hub lock poisoned")
            .push(Subscriber {
                interest,
                sender: tx,
            });
        rx
    }

    /// Emit a change for one scope, routing to all matching subscribers.
    pub(crate) fn emit(&self, scope: Scope) {
        trace!(%scope, "change emitted");
        let event = ChangeEvent { scope };
        let mut subscribers = self.subscribers.write().expect("hub lock poisoned");
        subscribers.retain(|sub| {
            if sub.interest.matches(&event) {
                // If send fails (no receivers), the subscriber is stale.
                sub.sender.send(event.clone()).is_ok()
            } else {
                // Keep non-matching subscribers unless their channel closed.
                sub.sender.receiver_count() > 0
            }
        });
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("hub lock poisoned").len()
    }
}
