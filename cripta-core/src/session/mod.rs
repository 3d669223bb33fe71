//! Session lifecycle: the only place the master key lives while unlocked.
//!
//! States are `Locked` and `Unlocked`. The session locks on request, after
//! a period without activity, or when the app returns from the background
//! after the grace period. Locking zeroes the key for every holder of a
//! [`MasterKey`] handle obtained from [`VaultSession::get_master_key`].

mod listeners;
pub mod scheduler;

pub use listeners::Subscription;
pub use scheduler::TaskScheduler;

use crate::config::SessionConfig;
use crate::crypto::{MasterKey, KEY_LENGTH};
use crate::{CriptaError, Result};
use listeners::ListenerRegistry;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::{Arc, Weak};
use tokio::time::Instant;
use tracing::{debug, info};

const INACTIVITY_TIMER: &str = "inactivity";

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Locked,
    Unlocked,
}

/// Why the session was locked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    Manual,
    Inactivity,
    Background,
}

/// Foreground state reported by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Active,
    Background,
    Inactive,
}

#[derive(Default)]
struct SessionState {
    master_key: Option<MasterKey>,
    backgrounded_at: Option<Instant>,
    /// Bumped on every inactivity reschedule; a timer only locks if its
    /// epoch is still current.
    epoch: u64,
}

struct SessionInner {
    state: Mutex<SessionState>,
    /// Serializes whole transitions: key swap, timer arm/cancel, notify.
    /// Reentrant so listeners may call back into the session.
    transition: ReentrantMutex<()>,
    listeners: ListenerRegistry,
    scheduler: TaskScheduler,
    config: SessionConfig,
}

/// Holds the master key in memory and enforces auto-lock.
///
/// Cheap to clone; clones share one session. Construct once at startup,
/// inside the tokio runtime that should drive the timers.
#[derive(Clone)]
pub struct VaultSession {
    inner: Arc<SessionInner>,
}

impl VaultSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::default()),
                transition: ReentrantMutex::new(()),
                listeners: ListenerRegistry::default(),
                scheduler: TaskScheduler::new(),
                config,
            }),
        }
    }

    /// Store the master key and enter `Unlocked`.
    ///
    /// Unlocking an unlocked session replaces (and wipes) the previous key
    /// without notifying, since the state does not change.
    pub fn unlock(&self, master_key: &[u8]) -> Result<()> {
        if master_key.len() != KEY_LENGTH {
            return Err(CriptaError::Validation(format!(
                "master key must be {} bytes, got {}",
                KEY_LENGTH,
                master_key.len()
            )));
        }
        let key = MasterKey::try_from_slice(master_key)?;

        let _transition = self.inner.transition.lock();
        let previous = {
            let mut state = self.inner.state.lock();
            state.backgrounded_at = None;
            state.master_key.replace(key)
        };

        self.schedule_inactivity();

        match previous {
            Some(old) => {
                old.zeroize();
                debug!("Session key replaced");
            }
            None => {
                info!("Vault unlocked");
                self.inner.listeners.notify(SessionStatus::Unlocked);
            }
        }
        Ok(())
    }

    /// Zero and drop the master key. No-op when already locked.
    pub fn lock(&self) {
        self.lock_with_reason(LockReason::Manual);
    }

    fn lock_with_reason(&self, reason: LockReason) {
        let _transition = self.inner.transition.lock();
        self.lock_in_transition(reason);
    }

    /// Caller holds the transition lock.
    fn lock_in_transition(&self, reason: LockReason) {
        let key = {
            let mut state = self.inner.state.lock();
            state.backgrounded_at = None;
            state.master_key.take()
        };

        self.inner.scheduler.cancel_all();

        if let Some(key) = key {
            key.zeroize();
            drop(key);
            info!("Vault locked ({:?})", reason);
            self.inner.listeners.notify(SessionStatus::Locked);
        }
    }

    /// Master key handle; counts as activity.
    pub fn get_master_key(&self) -> Result<MasterKey> {
        let _transition = self.inner.transition.lock();
        let key = self
            .inner
            .state
            .lock()
            .master_key
            .clone()
            .ok_or(CriptaError::Locked)?;
        self.schedule_inactivity();
        Ok(key)
    }

    /// Record user activity, restarting the inactivity timer.
    pub fn touch(&self) {
        let _transition = self.inner.transition.lock();
        if self.is_unlocked() {
            self.schedule_inactivity();
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.inner.state.lock().master_key.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_unlocked() {
            SessionStatus::Unlocked
        } else {
            SessionStatus::Locked
        }
    }

    /// Apply the background policy for a foreground state change.
    pub fn handle_app_state(&self, app_state: AppState) {
        match app_state {
            AppState::Background | AppState::Inactive => {
                let mut state = self.inner.state.lock();
                if state.master_key.is_some() && state.backgrounded_at.is_none() {
                    state.backgrounded_at = Some(Instant::now());
                    debug!("App moved to background");
                }
            }
            AppState::Active => {
                let _transition = self.inner.transition.lock();
                let since = self.inner.state.lock().backgrounded_at.take();
                let Some(since) = since else {
                    return;
                };
                if since.elapsed() > self.inner.config.background_grace() {
                    self.lock_in_transition(LockReason::Background);
                } else if self.is_unlocked() {
                    self.schedule_inactivity();
                }
            }
        }
    }

    /// Register a listener for lock/unlock transitions. Listeners run
    /// synchronously, in registration order.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(SessionStatus) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    /// Caller holds the transition lock.
    fn schedule_inactivity(&self) {
        let epoch = {
            let mut state = self.inner.state.lock();
            state.epoch += 1;
            state.epoch
        };
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        self.inner.scheduler.schedule(
            INACTIVITY_TIMER,
            self.inner.config.inactivity_timeout(),
            move || {
                if let Some(inner) = weak.upgrade() {
                    VaultSession { inner }.expire(epoch);
                }
            },
        );
    }

    fn expire(&self, epoch: u64) {
        let _transition = self.inner.transition.lock();
        let current = self.inner.state.lock().epoch;
        if current != epoch {
            debug!("Stale inactivity timer ignored");
            return;
        }
        self.lock_in_transition(LockReason::Inactivity);
    }
}

impl Default for VaultSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
