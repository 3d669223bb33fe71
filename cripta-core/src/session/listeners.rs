//! Observer registry for session state changes.

use crate::session::SessionStatus;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

type Listener = Arc<dyn Fn(SessionStatus) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_token: u64,
    // Tokens increase monotonically, so key order is registration order
    listeners: BTreeMap<u64, Listener>,
}

#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerRegistry {
    pub(crate) fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(SessionStatus) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        inner.next_token += 1;
        let token = inner.next_token;
        inner.listeners.insert(token, Arc::new(listener));
        Subscription {
            token,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Call every listener in registration order. No lock is held while
    /// listeners run, so they may subscribe, unsubscribe or query the
    /// session.
    pub(crate) fn notify(&self, status: SessionStatus) {
        let snapshot: Vec<Listener> = self.inner.lock().listeners.values().cloned().collect();
        for listener in snapshot {
            listener(status);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the listener
/// registered; call [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    token: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().listeners.remove(&self.token);
        }
    }
}
