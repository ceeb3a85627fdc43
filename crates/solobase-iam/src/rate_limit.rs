//! Token-bucket rate limiter keyed by `(user_id, route_class)`.

use std::sync::Mutex;
use std::time::Instant;

use dashmap::DashMap;
use solobase_core::RateLimitConfig;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// In-process token-bucket rate limiter.
///
/// One bucket per `(user_id, route_class)` pair, refilled continuously at
/// `refill_per_minute` and capped at `burst`. `route_class` lets callers
/// give write endpoints a tighter budget than read endpoints while sharing
/// one limiter instance.
pub struct RateLimiter {
    buckets: DashMap<(String, String), Mutex<Bucket>>,
    config: RateLimitConfig,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_buckets", &self.buckets.len())
            .finish()
    }
}

impl RateLimiter {
    /// Build a limiter from the configured refill rate and burst.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Attempt to consume one token for `(user_id, route_class)`. Returns
    /// `true` if the request may proceed.
    #[must_use]
    pub fn try_acquire(&self, user_id: &str, route_class: &str) -> bool {
        let key = (user_id.to_owned(), route_class.to_owned());
        let entry = self.buckets.entry(key).or_insert_with(|| {
            Mutex::new(Bucket {
                tokens: f64::from(self.config.burst),
                last_refill: Instant::now(),
            })
        });

        let mut bucket = entry.lock().expect("rate limit mutex poisoned");

        let now = Instant::now();
        let elapsed_secs = now.duration_since(bucket.last_refill).as_secs_f64();
        let refill = elapsed_secs * (f64::from(self.config.refill_per_minute) / 60.0);
        bucket.tokens = (bucket.tokens + refill).min(f64::from(self.config.burst));
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_allow_burst_then_reject() {
        let limiter = RateLimiter::new(RateLimitConfig {
            refill_per_minute: 60,
            burst: 3,
        });

        assert!(limiter.try_acquire("user-1", "read"));
        assert!(limiter.try_acquire("user-1", "read"));
        assert!(limiter.try_acquire("user-1", "read"));
        assert!(!limiter.try_acquire("user-1", "read"));
    }

    #[test]
    fn test_should_track_route_classes_independently() {
        let limiter = RateLimiter::new(RateLimitConfig {
            refill_per_minute: 60,
            burst: 1,
        });

        assert!(limiter.try_acquire("user-1", "read"));
        assert!(limiter.try_acquire("user-1", "write"));
        assert!(!limiter.try_acquire("user-1", "read"));
    }

    #[test]
    fn test_should_track_users_independently() {
        let limiter = RateLimiter::new(RateLimitConfig {
            refill_per_minute: 60,
            burst: 1,
        });

        assert!(limiter.try_acquire("user-1", "read"));
        assert!(limiter.try_acquire("user-2", "read"));
    }
}
