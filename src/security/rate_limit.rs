//! Per-client admission control over a fixed window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::config::RateLimitConfig;

/// Request count within one client's current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Result of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Time until the current window ends.
    pub reset_after: Duration,
}

/// Fixed-window rate limiter keyed by client identity.
///
/// Each identity's window lives in its own `DashMap` entry, so concurrent
/// requests from one client serialize on that entry only.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
    enabled: bool,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            enabled: config.enabled,
            clock,
        }
    }

    /// Whether a request from `identity` may proceed.
    pub fn admit(&self, identity: &str) -> bool {
        self.check(identity).allowed
    }

    /// Count a request from `identity` against its window.
    pub fn check(&self, identity: &str) -> Admission {
        if !self.enabled {
            return Admission {
                allowed: true,
                remaining: self.max_requests,
                reset_after: Duration::ZERO,
            };
        }

        let now = self.clock.now();
        let mut window = self
            .windows
            .entry(identity.to_owned())
            .or_insert(Window { count: 0, started: now });

        let elapsed = now.duration_since(window.started);
        if elapsed >= self.window {
            *window = Window { count: 0, started: now };
        }

        let allowed = window.count < self.max_requests;
        if allowed {
            window.count += 1;
        }

        Admission {
            allowed,
            remaining: self.max_requests - window.count,
            reset_after: self.window.saturating_sub(now.duration_since(window.started)),
        }
    }

    /// Drop windows that have already ended. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked identities.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Periodically purge expired windows until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.enabled {
            return;
        }

        let mut ticker = tokio::time::interval(self.window);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    tracing::debug!(removed, tracked = self.tracked(), "Rate limit windows swept");
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
