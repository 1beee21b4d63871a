// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-identity fixed-window burst limiter

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::config::BurstConfig;

#[derive(Debug, Clone, Copy)]
struct BurstEntry {
    count: u32,
    window_reset_at: Instant,
}

/// Outcome of a burst check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstDecision {
    /// Request counted; `remaining` more fit in the current window
    Allowed { remaining: u32 },
    /// Window is full until `retry_after` has elapsed
    Limited { retry_after: Duration },
}

impl BurstDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, BurstDecision::Allowed { .. })
    }
}

/// In-process request throttle keyed by identity string.
///
/// The first request from an identity opens a window; requests inside the
/// window are counted until the cap is reached, after which they are refused
/// until the window ends and both window and counter restart.
pub struct BurstLimiter {
    entries: Mutex<HashMap<String, BurstEntry>>,
    max_per_window: u32,
    window: Duration,
    grace: Duration,
}

impl BurstLimiter {
    pub fn new(config: &BurstConfig) -> Self {
        Self::with_window(
            config.max_requests,
            Duration::from_secs(config.window_secs),
        )
        .with_grace(Duration::from_secs(config.grace_secs))
    }

    /// Create a limiter with a custom window duration
    pub fn with_window(max_per_window: u32, window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_per_window,
            window,
            grace: window,
        }
    }

    /// How long an expired entry is kept before `sweep_expired` drops it
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn max_per_window(&self) -> u32 {
        self.max_per_window
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request and report whether it fits in the identity's window
    pub fn check(&self, identity: &str) -> BurstDecision {
        self.check_at(identity, Instant::now())
    }

    pub fn check_at(&self, identity: &str, now: Instant) -> BurstDecision {
        let mut entries = self.lock();
        let entry = entries
            .entry(identity.to_string())
            .or_insert(BurstEntry {
                count: 0,
                window_reset_at: now + self.window,
            });

        if now >= entry.window_reset_at {
            entry.count = 0;
            entry.window_reset_at = now + self.window;
        }

        if entry.count >= self.max_per_window {
            return BurstDecision::Limited {
                retry_after: entry.window_reset_at.saturating_duration_since(now),
            };
        }

        entry.count += 1;
        BurstDecision::Allowed {
            remaining: self.max_per_window - entry.count,
        }
    }

    /// Boolean form of `check`
    pub fn allow(&self, identity: &str) -> bool {
        self.check(identity).is_allowed()
    }

    pub fn allow_at(&self, identity: &str, now: Instant) -> bool {
        self.check_at(identity, now).is_allowed()
    }

    /// Drop entries whose window ended more than the grace period ago.
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| now < e.window_reset_at + self.grace);
        before - entries.len()
    }

    /// Number of identities currently tracked
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BurstEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
