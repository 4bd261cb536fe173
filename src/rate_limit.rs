//! # Submission rate limiting
//!
//! Fixed quota per sliding time window, keyed by client identity. This
//! bounds load on the write path; it is independent of the locking that
//! guarantees correctness, and rejecting an over-quota request never
//! touches store state.
//!
//! Counters live in memory. A periodic sweep (spawned at startup) drops
//! expired windows so the map does not grow with one entry per client
//! ever seen.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};

use crate::error::AppError;

struct Counter {
    count: u32,
    expires_at: Instant,
    reset_at: DateTime<Utc>,
}

/// Snapshot of a client's remaining quota, surfaced as the
/// `X-RateLimit-*` response headers.
#[derive(Debug, Clone)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    counters: Mutex<HashMap<String, Counter>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request against `key`. Over-quota requests get
    /// [`AppError::RateLimited`] carrying the reset instant.
    pub fn check(&self, key: &str) -> Result<Quota, AppError> {
        let mut counters = self.counters.lock().unwrap();
        let now = Instant::now();

        let counter = counters.entry(key.to_string()).or_insert_with(|| Counter {
            count: 0,
            expires_at: now + self.window,
            reset_at: Utc::now() + self.window,
        });

        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = now + self.window;
            counter.reset_at = Utc::now() + self.window;
        }

        counter.count += 1;

        if counter.count > self.limit {
            return Err(AppError::RateLimited {
                limit: self.limit,
                reset_at: counter.reset_at.to_rfc3339(),
                retry_after: self.window.as_secs(),
            });
        }

        Ok(Quota {
            limit: self.limit,
            remaining: self.limit - counter.count,
            reset_at: counter.reset_at,
        })
    }

    /// Drop counters whose window has passed.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.counters
            .lock()
            .unwrap()
            .retain(|_, counter| counter.expires_at > now);
    }
}
