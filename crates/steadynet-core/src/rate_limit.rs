//! Local, per-key sliding-window counter used to throttle UI actions.
//!
//! Purely client-side: it never blocks, never talks to the server and is
//! unrelated to server-side limits. A rejected check is for the caller to
//! surface; it does not feed the retry policy.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RateLimitConfig;

#[derive(Debug)]
pub struct RateLimiter {
    max_events: u32,
    window: Duration,
    events: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_events: u32, window: Duration) -> Self {
        Self {
            max_events: max_events.max(1),
            window,
            events: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(cfg.max_events, Duration::from_millis(cfg.window_ms))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(queue: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while queue
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= window)
        {
            queue.pop_front();
        }
    }

    /// Record an event for `key` if it is within budget. Returns `false`
    /// (and records nothing) when the window is already full.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut events = self.lock();
        let queue = events.entry(key.to_string()).or_default();
        Self::prune(queue, self.window, now);
        if queue.len() >= self.max_events as usize {
            tracing::debug!(key, "local rate limit reached");
            return false;
        }
        queue.push_back(now);
        // Keys whose windows have lapsed are dropped here rather than kept as empty queues.
        events.retain(|_, q| {
            Self::prune(q, self.window, now);
            !q.is_empty()
        });
        true
    }

    /// Events still allowed for `key` in the current window.
    pub fn remaining(&self, key: &str) -> u32 {
        let now = Instant::now();
        let mut events = self.lock();
        let used = match events.get_mut(key) {
            Some(queue) => {
                Self::prune(queue, self.window, now);
                let used = queue.len() as u32;
                if used == 0 {
                    events.remove(key);
                }
                used
            }
            None => 0,
        };
        self.max_events.saturating_sub(used)
    }

    /// Number of keys with events still inside the window.
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    pub fn reset(&self, key: &str) {
        self.lock().remove(key);
    }
}
