use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::entry::{CallControl, Outcome, Slot};
use super::error::DedupError;

type Slots<T, E> = Mutex<HashMap<String, Slot<T, E>>>;

fn lock<T, E>(slots: &Slots<T, E>) -> MutexGuard<'_, HashMap<String, Slot<T, E>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of the single check-and-set step under the lock.
enum Lookup<T, E> {
    Hit(T),
    Join {
        generation: u64,
        rx: watch::Receiver<Outcome<T, E>>,
        control: Arc<CallControl>,
    },
    Start {
        generation: u64,
        tx: watch::Sender<Outcome<T, E>>,
        rx: watch::Receiver<Outcome<T, E>>,
        control: Arc<CallControl>,
    },
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Held by each waiter until it receives the outcome. The last waiter to
/// leave early cancels the call and releases its slot.
struct WaiterGuard<T, E> {
    slots: Arc<Slots<T, E>>,
    key: String,
    generation: u64,
    control: Arc<CallControl>,
    armed: bool,
}

impl<T, E> Drop for WaiterGuard<T, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut map = lock(&self.slots);
        if self.control.waiters.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        self.control.cancelled.store(true, Ordering::Release);
        self.control.abandon.notify_one();
        if map.get(&self.key).is_some_and(|s| s.owned_by(self.generation)) {
            map.remove(&self.key);
        }
        tracing::debug!(key = %self.key, generation = self.generation, "all waiters left; call cancelled");
    }
}

/// Keyed store collapsing concurrent identical requests into one call.
///
/// Cloning is cheap and clones share the same store. The underlying
/// operation runs on its own task: it keeps running while at least one
/// caller still waits for it, and is cancelled (without touching the cache)
/// once every waiter has gone.
pub struct DedupCache<T, E> {
    slots: Arc<Slots<T, E>>,
    next_generation: Arc<AtomicU64>,
}

impl<T, E> Clone for DedupCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            next_generation: Arc::clone(&self.next_generation),
        }
    }
}

impl<T, E> Default for DedupCache<T, E> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T, E> std::fmt::Debug for DedupCache<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCache")
            .field("entries", &lock(&self.slots).len())
            .finish()
    }
}

impl<T, E> DedupCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared outcome for `key`.
    ///
    /// Joins an in-flight call if there is one, serves a settled value younger
    /// than `ttl` without calling, and otherwise starts `operation` as the new
    /// in-flight call. Failures remove the key and reach every waiter.
    /// Dropping this future before it resolves withdraws the caller; the call
    /// is cancelled when no waiter remains.
    pub async fn dedupe<F, Fut>(
        &self,
        key: &str,
        operation: F,
        ttl: Duration,
    ) -> Result<T, DedupError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (generation, rx, control) = match self.lookup_or_reserve(key, ttl) {
            Lookup::Hit(value) => {
                tracing::trace!(key, "dedup cache hit");
                return Ok(value);
            }
            Lookup::Join {
                generation,
                rx,
                control,
            } => {
                tracing::trace!(key, generation, "joining in-flight call");
                (generation, rx, control)
            }
            Lookup::Start {
                generation,
                tx,
                rx,
                control,
            } => {
                tracing::debug!(key, generation, "starting deduplicated call");
                self.spawn_call(
                    key.to_string(),
                    generation,
                    operation(),
                    tx,
                    Arc::clone(&control),
                );
                (generation, rx, control)
            }
        };

        let mut guard = WaiterGuard {
            slots: Arc::clone(&self.slots),
            key: key.to_string(),
            generation,
            control,
            armed: true,
        };
        let outcome = wait_outcome(rx).await;
        guard.armed = false;
        outcome
    }

    /// Check cache state and reserve the slot (or register as a waiter) in
    /// one critical section.
    fn lookup_or_reserve(&self, key: &str, ttl: Duration) -> Lookup<T, E> {
        let mut slots = lock(&self.slots);
        match slots.get(key) {
            Some(Slot::InFlight {
                generation,
                rx,
                control,
            }) => {
                control.waiters.fetch_add(1, Ordering::AcqRel);
                return Lookup::Join {
                    generation: *generation,
                    rx: rx.clone(),
                    control: Arc::clone(control),
                };
            }
            Some(slot @ Slot::Settled { value, .. }) if slot.is_fresh(ttl, Instant::now()) => {
                return Lookup::Hit(value.clone());
            }
            _ => {}
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        let control = Arc::new(CallControl::default());
        control.waiters.store(1, Ordering::Release);
        slots.insert(
            key.to_string(),
            Slot::InFlight {
                generation,
                rx: rx.clone(),
                control: Arc::clone(&control),
            },
        );
        Lookup::Start {
            generation,
            tx,
            rx,
            control,
        }
    }

    fn spawn_call<Fut>(
        &self,
        key: String,
        generation: u64,
        fut: Fut,
        tx: watch::Sender<Outcome<T, E>>,
        control: Arc<CallControl>,
    ) where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        tokio::spawn(async move {
            let mut call = AbortOnDrop(tokio::spawn(fut));
            let joined = tokio::select! {
                joined = &mut call.0 => joined,
                _ = control.abandon.notified() => {
                    // `call` is dropped here, aborting the operation and any pending backoff.
                    tracing::trace!(key = %key, generation, "deduplicated call abandoned");
                    return;
                }
            };
            let outcome = match joined {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(DedupError::Operation(Arc::new(e))),
                Err(join_err) => {
                    tracing::warn!(key = %key, error = %join_err, "deduplicated call did not complete");
                    Err(DedupError::Panicked)
                }
            };

            {
                let mut map = lock(&slots);
                if control.cancelled.load(Ordering::Acquire) {
                    // Every waiter left before we got here; leave the cache alone.
                    return;
                }
                match &outcome {
                    Ok(value) => {
                        // Our own slot, or one emptied by invalidation; never a newer call's.
                        if map.get(&key).map_or(true, |s| s.owned_by(generation)) {
                            map.insert(
                                key.clone(),
                                Slot::Settled {
                                    value: value.clone(),
                                    settled_at: Instant::now(),
                                },
                            );
                        }
                    }
                    Err(_) => {
                        if map.get(&key).is_some_and(|s| s.owned_by(generation)) {
                            map.remove(&key);
                        }
                    }
                }
            }

            tracing::trace!(key = %key, ok = outcome.is_ok(), "deduplicated call settled");
            let _ = tx.send(Some(outcome));
        });
    }

    /// Settled value for `key` if younger than `ttl`.
    pub fn get_fresh(&self, key: &str, ttl: Duration) -> Option<T> {
        let slots = lock(&self.slots);
        match slots.get(key) {
            Some(slot @ Slot::Settled { value, .. }) if slot.is_fresh(ttl, Instant::now()) => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    /// Remove one key regardless of state. An in-flight call is not cancelled.
    pub fn invalidate(&self, key: &str) -> bool {
        lock(&self.slots).remove(key).is_some()
    }

    /// Remove every entry. In-flight calls are not cancelled.
    pub fn clear(&self) {
        lock(&self.slots).clear();
    }

    /// Drop settled entries older than `ttl`; returns how many were removed.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut slots = lock(&self.slots);
        let before = slots.len();
        slots.retain(|_, slot| slot.is_in_flight() || slot.is_fresh(ttl, now));
        before - slots.len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.slots).get(key).is_some_and(Slot::is_in_flight)
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn wait_outcome<T, E>(mut rx: watch::Receiver<Outcome<T, E>>) -> Result<T, DedupError<E>>
where
    T: Clone,
{
    match rx.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome).clone().unwrap_or(Err(DedupError::Panicked)),
        Err(_) => Err(DedupError::Panicked),
    }
}
