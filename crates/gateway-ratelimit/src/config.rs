use std::num::NonZeroUsize;

/// Tunables for a [`crate::limiter::RateLimiter`]'s two bucket pools.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub capacity: f64,
    pub refill_rate: f64,
    /// Max entries kept per bucket pool before the least-recently-accessed
    /// bucket is evicted.
    pub max_buckets: NonZeroUsize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 100.0,
            refill_rate: 10.0,
            max_buckets: NonZeroUsize::new(100_000).unwrap(),
        }
    }
}
