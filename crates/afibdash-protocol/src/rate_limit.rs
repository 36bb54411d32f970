//! Best-effort in-memory fixed-window rate limiting.
//!
//! Buckets live in this process only; restarts and additional instances
//! each start with a clean slate.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// Bucket count above which expired buckets are swept before a check.
pub const MAX_TRACKED_KEYS: usize = 10_000;

/// Window length and request budget for one kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimit {
    pub const fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// Per-key fixed-window counter.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    max_keys: usize,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_max_keys(MAX_TRACKED_KEYS)
    }

    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_keys,
        }
    }

    /// Count one request for `key`.
    ///
    /// Returns `Err(retry_after_seconds)` once the window's budget is spent.
    pub fn check(&self, key: &str, limit: RateLimit) -> Result<(), u64> {
        self.check_at(key, limit, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, key: &str, limit: RateLimit, now: Instant) -> Result<(), u64> {
        let mut buckets = self.buckets.lock();

        if buckets.len() > self.max_keys {
            let before = buckets.len();
            buckets.retain(|_, bucket| bucket.reset_at > now);
            debug!(before, after = buckets.len(), "Swept expired rate-limit buckets");
        }

        if let Some(bucket) = buckets.get_mut(key) {
            if bucket.reset_at > now {
                if bucket.count >= limit.max_requests {
                    return Err(ceil_secs(bucket.reset_at - now).max(1));
                }
                bucket.count += 1;
                return Ok(());
            }
        }

        buckets.insert(
            key.to_string(),
            Bucket {
                count: 1,
                reset_at: now + limit.window,
            },
        );
        Ok(())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
