//! Host lifecycle integration.
//!
//! Hosts that can suspend the process (mobile apps, backgrounded desktop
//! clients, signal-driven daemons) tell the connection when they are about to
//! suspend and when they became active again. Hosts without such a concept use
//! [`AlwaysActive`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info};

use crate::lock;

/// Host lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleSignal {
    /// Host returned to the foreground
    BecameActive,
    /// Host is about to be suspended
    WillSuspend,
}

/// Callback invoked when a subscribed signal fires
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Source of host lifecycle state and signals
pub trait LifecycleProvider: Send + Sync {
    /// Whether the host is currently running in the foreground
    fn is_active(&self) -> bool;

    /// Register `callback` for `signal`. Dropping the returned handle unsubscribes.
    fn subscribe(&self, signal: LifecycleSignal, callback: LifecycleCallback) -> Subscription;
}

/// Capability to unsubscribe from a lifecycle signal.
///
/// Released on [`Subscription::unsubscribe`] or on drop.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Subscription that holds nothing
    pub fn inert() -> Self {
        Self { release: None }
    }

    /// Subscription that runs `release` when dropped
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unsubscribe now
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.release.is_some())
            .finish()
    }
}

/// Provider for hosts that never suspend
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysActive;

impl LifecycleProvider for AlwaysActive {
    fn is_active(&self) -> bool {
        true
    }

    fn subscribe(&self, _signal: LifecycleSignal, _callback: LifecycleCallback) -> Subscription {
        Subscription::inert()
    }
}

struct HostState {
    active: AtomicBool,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, (LifecycleSignal, LifecycleCallback)>>,
}

/// Provider driven by the host's own foreground/background notifications.
///
/// The host calls [`HostLifecycle::became_active`] and
/// [`HostLifecycle::will_suspend`]. The new state is recorded before any
/// subscriber runs, so events caused by a subscriber already observe it.
#[derive(Clone)]
pub struct HostLifecycle {
    state: Arc<HostState>,
}

impl HostLifecycle {
    /// Create a provider starting in the given state
    pub fn new(initially_active: bool) -> Self {
        Self {
            state: Arc::new(HostState {
                active: AtomicBool::new(initially_active),
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Host returned to the foreground
    pub fn became_active(&self) {
        self.state.active.store(true, Ordering::SeqCst);
        info!("Host became active");
        self.notify(LifecycleSignal::BecameActive);
    }

    /// Host is about to suspend
    pub fn will_suspend(&self) {
        self.state.active.store(false, Ordering::SeqCst);
        info!("Host will suspend");
        self.notify(LifecycleSignal::WillSuspend);
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.state.subscribers).len()
    }

    fn notify(&self, signal: LifecycleSignal) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe
        let callbacks: Vec<LifecycleCallback> = {
            let mut subscribers: Vec<_> = lock(&self.state.subscribers)
                .iter()
                .filter(|(_, (registered, _))| *registered == signal)
                .map(|(id, (_, callback))| (*id, Arc::clone(callback)))
                .collect();
            subscribers.sort_by_key(|(id, _)| *id);
            subscribers.into_iter().map(|(_, callback)| callback).collect()
        };

        debug!("Notifying {} subscribers of {:?}", callbacks.len(), signal);
        for callback in callbacks {
            callback();
        }
    }
}

impl Default for HostLifecycle {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for HostLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostLifecycle")
            .field("active", &self.is_active())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl LifecycleProvider for HostLifecycle {
    fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    fn subscribe(&self, signal: LifecycleSignal, callback: LifecycleCallback) -> Subscription {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.state.subscribers).insert(id, (signal, callback));

        let state: Weak<HostState> = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                lock(&state.subscribers).remove(&id);
            }
        })
    }
}
