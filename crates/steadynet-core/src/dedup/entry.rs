//! Cache slot states.

use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use super::error::DedupError;

/// Outcome published to waiters; `None` until the call settles.
pub(super) type Outcome<T, E> = Option<Result<T, DedupError<E>>>;

/// Shared between one in-flight call and its waiters.
///
/// `waiters` and `cancelled` are only changed while the cache lock is held,
/// so joining, abandoning and settling are ordered with respect to each other.
#[derive(Debug, Default)]
pub(super) struct CallControl {
    pub(super) waiters: AtomicUsize,
    pub(super) cancelled: AtomicBool,
    pub(super) abandon: Notify,
}

/// One keyed slot in the cache.
pub(super) enum Slot<T, E> {
    /// Call underway. `generation` identifies which call owns the slot.
    InFlight {
        generation: u64,
        rx: watch::Receiver<Outcome<T, E>>,
        control: Arc<CallControl>,
    },
    /// Successful result stamped with its completion time.
    Settled { value: T, settled_at: Instant },
}

impl<T, E> Slot<T, E> {
    /// Settled and younger than `ttl`, judged at read time.
    pub(super) fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        match self {
            Slot::Settled { settled_at, .. } => now.saturating_duration_since(*settled_at) < ttl,
            Slot::InFlight { .. } => false,
        }
    }

    pub(super) fn is_in_flight(&self) -> bool {
        matches!(self, Slot::InFlight { .. })
    }

    pub(super) fn owned_by(&self, generation: u64) -> bool {
        matches!(self, Slot::InFlight { generation: g, .. } if *g == generation)
    }
}
