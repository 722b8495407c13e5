//! Per-key sliding-window rate limiter.
//!
//! Each key owns a FIFO of request instants inside the trailing window. Every
//! [`RateLimiter::allow`] call prunes the FIFO, decides, and records under the
//! key's shard lock, so two concurrent callers can never both take the last
//! slot. [`RateLimiter::sweep`] only reclaims memory for quiet keys.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub permitted: bool,
    pub limit: usize,
    pub remaining: usize,
    /// When the window next frees a slot (denied) or fully resets (permitted).
    pub reset_at: Instant,
}

impl Decision {
    /// `reset_at` as Unix epoch seconds, rounded up.
    pub fn reset_epoch_seconds(&self) -> i64 {
        let wait = self.reset_at.saturating_duration_since(Instant::now());
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        Utc::now().timestamp() + secs as i64
    }

    /// Whole seconds until `reset_at`, never below one when denied.
    pub fn retry_after_seconds(&self) -> u64 {
        let wait = self.reset_at.saturating_duration_since(Instant::now());
        (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1)
    }
}

pub struct RateLimiter {
    name: &'static str,
    limit: usize,
    window: Duration,
    entries: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit` requests per `window` per key.
    ///
    /// `name` labels logs and metrics (`auth`, `redirect`).
    pub fn new(name: &'static str, limit: usize, window: Duration) -> Self {
        Self {
            name,
            limit,
            window,
            entries: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn allow(&self, key: &str) -> Decision {
        self.allow_at(key, Instant::now())
    }

    /// Admission check at an explicit instant.
    pub fn allow_at(&self, key: &str, now: Instant) -> Decision {
        let window_start = now.checked_sub(self.window);

        let mut entry = self.entries.entry(key.to_owned()).or_default();
        let stamps = entry.value_mut();
        prune(stamps, window_start);

        if stamps.len() >= self.limit {
            let reset_at = stamps
                .front()
                .map_or(now + self.window, |oldest| *oldest + self.window);

            return Decision {
                permitted: false,
                limit: self.limit,
                remaining: 0,
                reset_at,
            };
        }

        stamps.push_back(now);

        Decision {
            permitted: true,
            limit: self.limit,
            remaining: self.limit - stamps.len(),
            reset_at: now + self.window,
        }
    }

    /// Prunes every key and drops the ones left empty. Returns the number of
    /// keys removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let window_start = now.checked_sub(self.window);
        let before = self.entries.len();

        self.entries.retain(|_, stamps| {
            prune(stamps, window_start);
            !stamps.is_empty()
        });

        before.saturating_sub(self.entries.len())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

/// Drops instants at or before `window_start`.
fn prune(stamps: &mut VecDeque<Instant>, window_start: Option<Instant>) {
    let Some(start) = window_start else {
        return;
    };

    while stamps.front().is_some_and(|t| *t <= start) {
        stamps.pop_front();
    }
}
