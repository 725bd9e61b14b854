//! Online/offline state with ordered subscriber notification.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tokio::sync::watch;

use super::quality::{estimate, ConnectivityQuality, LinkSnapshot};

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

/// Shared connectivity state: the online flag, the latest link snapshot and
/// the subscribers to notify on transitions.
///
/// Constructed once by the host and injected (as `Arc`) into the retry
/// executor and any UI collaborators. Mutated only through [`set_online`]
/// and [`update_link`].
///
/// [`set_online`]: ConnectivitySignal::set_online
/// [`update_link`]: ConnectivitySignal::update_link
pub struct ConnectivitySignal {
    online: watch::Sender<bool>,
    link: RwLock<Option<LinkSnapshot>>,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    // Serializes transition + broadcast so subscribers observe transitions in order.
    transition: Mutex<()>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ConnectivitySignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivitySignal")
            .field("online", &self.is_online())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ConnectivitySignal {
    /// Create a signal from the host-reported status at startup.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self {
            online: tx,
            link: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            transition: Mutex::new(()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Create a signal with an initial link snapshot.
    pub fn with_link(online: bool, link: LinkSnapshot) -> Self {
        let signal = Self::new(online);
        signal.update_link(Some(link));
        signal
    }

    /// Current online flag.
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Apply a host "online" (`true`) or "offline" (`false`) event.
    ///
    /// Subscribers are called synchronously, in registration order, only when
    /// the flag actually changes. Returns whether a transition happened.
    /// Callbacks may unsubscribe but must not call `set_online` themselves.
    pub fn set_online(&self, online: bool) -> bool {
        let _guard = self
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let changed = self.online.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if !changed {
            return false;
        }

        tracing::info!(online, "connectivity changed");
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(online);
        }
        true
    }

    /// Replace the latest link snapshot reported by the host.
    pub fn update_link(&self, link: Option<LinkSnapshot>) {
        *self.link.write().unwrap_or_else(PoisonError::into_inner) = link;
    }

    /// Latest link snapshot, if the host reported one.
    pub fn link(&self) -> Option<LinkSnapshot> {
        self.link
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Classify the current link.
    pub fn quality(&self) -> ConnectivityQuality {
        let link = self.link.read().unwrap_or_else(PoisonError::into_inner);
        estimate(link.as_ref())
    }

    /// Async view of the online flag for consumers that prefer awaiting changes.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Register a callback for online/offline transitions.
    ///
    /// The returned handle deregisters the callback; dropping the handle
    /// without calling [`Subscription::unsubscribe`] leaves it registered.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            signal: Arc::downgrade(self),
            active: AtomicBool::new(true),
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn remove_subscriber(&self, id: u64) {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|(sub_id, _)| *sub_id != id);
        if subs.is_empty() {
            tracing::debug!("last connectivity subscriber removed");
        }
    }
}

/// Capability to deregister a connectivity callback.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    signal: Weak<ConnectivitySignal>,
    active: AtomicBool,
}

impl Subscription {
    /// Deregister the callback. Idempotent.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(signal) = self.signal.upgrade() {
            signal.remove_subscriber(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
