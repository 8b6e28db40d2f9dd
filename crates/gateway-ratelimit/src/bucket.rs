use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// `max(1, ceil(size_bytes / 1024))`, the request/response token cost.
pub fn predicted_tokens(size_bytes: u64) -> f64 {
    ((size_bytes as f64) / 1024.0).ceil().max(1.0)
}

/// A snapshot of a bucket's state, as returned by the observable-state
/// queries and the rate-limit admin surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BucketSnapshot {
    pub tokens: f64,
    pub x402_tokens: f64,
    pub capacity: f64,
    pub refill_rate: f64,
    pub last_refill: u64,
}

/// What was actually drawn from a bucket's two pools, needed to roll a
/// reservation back exactly if a sibling bucket's reservation then fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumedBreakdown {
    pub from_x402: f64,
    pub from_regular: f64,
}

impl ConsumedBreakdown {
    pub fn total(&self) -> f64 {
        self.from_x402 + self.from_regular
    }
}

/// A single dual-pool token bucket: `tokens` refills linearly up to
/// `capacity`; `x402_tokens` are paid-for, never refill, and are always
/// drawn down first.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    pub tokens: f64,
    pub x402_tokens: f64,
    pub capacity: f64,
    pub refill_rate: f64,
    last_refill: SystemTime,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            x402_tokens: 0.0,
            capacity,
            refill_rate,
            last_refill: SystemTime::now(),
        }
    }

    pub fn refill(&mut self) {
        let now = SystemTime::now();
        let elapsed = now
            .duration_since(self.last_refill)
            .unwrap_or_default()
            .as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Attempts to reserve `amount` tokens, x402 first then regular. Leaves
    /// the bucket untouched and returns `None` if insufficient.
    pub fn try_reserve(&mut self, amount: f64) -> Option<ConsumedBreakdown> {
        self.refill();
        if self.x402_tokens + self.tokens < amount {
            return None;
        }
        let from_x402 = amount.min(self.x402_tokens);
        let from_regular = amount - from_x402;
        self.x402_tokens -= from_x402;
        self.tokens -= from_regular;
        Some(ConsumedBreakdown {
            from_x402,
            from_regular,
        })
    }

    /// Restores exactly what a prior `try_reserve` drew, used to unwind a
    /// reservation when a sibling bucket's reservation then fails.
    pub fn rollback(&mut self, consumed: ConsumedBreakdown) {
        self.x402_tokens += consumed.from_x402;
        self.tokens += consumed.from_regular;
    }

    /// Consumes an additional `amount` (the post-response "actual exceeded
    /// predicted" adjustment), draining to zero rather than denying.
    pub fn force_consume(&mut self, amount: f64) {
        self.refill();
        let from_x402 = amount.min(self.x402_tokens);
        self.x402_tokens -= from_x402;
        let remaining = amount - from_x402;
        self.tokens = (self.tokens - remaining).max(0.0);
    }

    /// Refunds `amount` to the regular pool only, clamped at capacity.
    pub fn refund_regular(&mut self, amount: f64) {
        self.tokens = (self.tokens + amount).min(self.capacity);
    }

    /// Adds `ceil(content_length / 1024) * capacity_multiplier` x402 tokens.
    pub fn top_off(&mut self, content_length: u64, capacity_multiplier: f64) {
        let tokens = ((content_length as f64) / 1024.0).ceil() * capacity_multiplier;
        self.x402_tokens += tokens;
    }

    pub fn snapshot(&self) -> BucketSnapshot {
        BucketSnapshot {
            tokens: self.tokens,
            x402_tokens: self.x402_tokens,
            capacity: self.capacity,
            refill_rate: self.refill_rate,
            last_refill: self
                .last_refill
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicted_tokens_rounds_up_and_floors_at_one() {
        assert_eq!(predicted_tokens(0), 1.0);
        assert_eq!(predicted_tokens(1), 1.0);
        assert_eq!(predicted_tokens(1024), 1.0);
        assert_eq!(predicted_tokens(1025), 2.0);
        assert_eq!(predicted_tokens(1_048_576), 1024.0);
    }

    #[test]
    fn reserve_draws_x402_before_regular() {
        let mut bucket = TokenBucket::new(100.0, 10.0);
        bucket.x402_tokens = 5.0;
        let consumed = bucket.try_reserve(8.0).unwrap();
        assert_eq!(consumed.from_x402, 5.0);
        assert_eq!(consumed.from_regular, 3.0);
        assert_eq!(bucket.x402_tokens, 0.0);
        assert_eq!(bucket.tokens, 97.0);
    }

    #[test]
    fn insufficient_tokens_denies_and_leaves_bucket_untouched() {
        let mut bucket = TokenBucket::new(10.0, 1.0);
        bucket.tokens = 2.0;
        assert!(bucket.try_reserve(5.0).is_none());
        assert_eq!(bucket.tokens, 2.0);
    }

    #[test]
    fn rollback_restores_exact_breakdown() {
        let mut bucket = TokenBucket::new(100.0, 10.0);
        bucket.x402_tokens = 5.0;
        let consumed = bucket.try_reserve(8.0).unwrap();
        bucket.rollback(consumed);
        assert_eq!(bucket.x402_tokens, 5.0);
        assert_eq!(bucket.tokens, 100.0);
    }

    #[test]
    fn payment_top_off_uses_capacity_multiplier() {
        let mut bucket = TokenBucket::new(100.0, 10.0);
        bucket.top_off(1_048_576, 2.0);
        assert_eq!(bucket.x402_tokens, 2048.0);
    }

    #[test]
    fn force_consume_drains_to_zero_without_denying() {
        let mut bucket = TokenBucket::new(10.0, 1.0);
        bucket.tokens = 2.0;
        bucket.force_consume(5.0);
        assert_eq!(bucket.tokens, 0.0);
    }

    #[test]
    fn refund_never_exceeds_capacity() {
        let mut bucket = TokenBucket::new(10.0, 1.0);
        bucket.tokens = 9.0;
        bucket.refund_regular(5.0);
        assert_eq!(bucket.tokens, 10.0);
    }
}
