use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Default sustained rate: 10 replies per minute per channel identity.
pub const DEFAULT_CAPACITY: f64 = 3.0;
pub const DEFAULT_REFILL_PER_SEC: f64 = 10.0 / 60.0;

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: f64, refill_per_sec: f64) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_refill = Instant::now();
    }

    fn try_consume(&mut self, capacity: f64, refill_per_sec: f64) -> bool {
        self.refill(capacity, refill_per_sec);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-`(channel, user)` token bucket guarding inbound reply/command volume.
///
/// Grounded on spec.md §4.4's default of 10 replies/minute with a burst of 3
/// — sustained refill keeps a flood of stale callback taps or chat turns from
/// saturating the PTY injection queue.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_REFILL_PER_SEC)
    }
}

impl RateLimiter {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if `identity` may proceed right now, consuming a token.
    pub fn check(&self, identity: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|p| p.into_inner());
        let bucket = buckets
            .entry(identity.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_consume(self.capacity, self.refill_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_capacity_is_consumable_immediately() {
        let limiter = RateLimiter::new(3.0, DEFAULT_REFILL_PER_SEC);
        assert!(limiter.check("telegram:1"));
        assert!(limiter.check("telegram:1"));
        assert!(limiter.check("telegram:1"));
        assert!(!limiter.check("telegram:1"));
    }

    #[test]
    fn identities_are_independent() {
        let limiter = RateLimiter::new(1.0, DEFAULT_REFILL_PER_SEC);
        assert!(limiter.check("telegram:1"));
        assert!(limiter.check("telegram:2"));
    }
}
