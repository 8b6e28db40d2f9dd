use std::net::IpAddr;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bucket::{predicted_tokens, BucketSnapshot, ConsumedBreakdown, TokenBucket};
use crate::config::RateLimiterConfig;

/// Which bucket denied a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    Ip,
    Resource,
}

/// A successful check-and-reserve, carrying what must be refunded or
/// topped up once the actual response size is known.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub ip: IpAddr,
    pub resource_key: String,
    pub predicted: f64,
    ip_consumed: ConsumedBreakdown,
    resource_consumed: ConsumedBreakdown,
}

pub enum AdmissionOutcome {
    Admitted(Reservation),
    Denied(LimitType),
}

/// Dual-bucket token limiter: a resource bucket keyed by
/// `method|host|path` and an IP bucket keyed by client address, both
/// bounded by an LRU so an unbounded set of keys cannot grow memory
/// without limit.
pub struct RateLimiter {
    config: RateLimiterConfig,
    ip_buckets: Mutex<LruCache<IpAddr, TokenBucket>>,
    resource_buckets: Mutex<LruCache<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let max_buckets = config.max_buckets;
        Self {
            config,
            ip_buckets: Mutex::new(LruCache::new(max_buckets)),
            resource_buckets: Mutex::new(LruCache::new(max_buckets)),
        }
    }

    /// Predicted tokens for a request/response of `size_bytes`.
    pub fn predicted_tokens(&self, size_bytes: u64) -> f64 {
        predicted_tokens(size_bytes)
    }

    /// Check-and-reserve: consumes from the resource bucket first, then the
    /// IP bucket (fixed lock order per the shared-resource policy). On a
    /// denial from either, any prior reservation is rolled back.
    pub async fn check_and_reserve(
        &self,
        ip: IpAddr,
        resource_key: String,
        predicted: f64,
    ) -> AdmissionOutcome {
        let resource_consumed = {
            let mut resource_buckets = self.resource_buckets.lock().await;
            let bucket = resource_buckets
                .get_or_insert_mut(resource_key.clone(), || {
                    TokenBucket::new(self.config.capacity, self.config.refill_rate)
                });
            match bucket.try_reserve(predicted) {
                Some(consumed) => consumed,
                None => {
                    debug!(resource = %resource_key, predicted, "resource bucket denied reservation");
                    return AdmissionOutcome::Denied(LimitType::Resource);
                }
            }
        };

        let ip_consumed = {
            let mut ip_buckets = self.ip_buckets.lock().await;
            let bucket = ip_buckets.get_or_insert_mut(ip, || {
                TokenBucket::new(self.config.capacity, self.config.refill_rate)
            });
            match bucket.try_reserve(predicted) {
                Some(consumed) => consumed,
                None => {
                    drop(ip_buckets);
                    let mut resource_buckets = self.resource_buckets.lock().await;
                    if let Some(bucket) = resource_buckets.get_mut(&resource_key) {
                        bucket.rollback(resource_consumed);
                    }
                    debug!(%ip, predicted, "ip bucket denied reservation");
                    return AdmissionOutcome::Denied(LimitType::Ip);
                }
            }
        };

        AdmissionOutcome::Admitted(Reservation {
            ip,
            resource_key,
            predicted,
            ip_consumed,
            resource_consumed,
        })
    }

    /// Post-response reconciliation: draws the delta if the response
    /// exceeded its prediction, or refunds the regular pool if it undershot.
    pub async fn adjust(&self, reservation: &Reservation, actual: f64) {
        let delta = actual - reservation.predicted;
        {
            let mut resource_buckets = self.resource_buckets.lock().await;
            if let Some(bucket) = resource_buckets.get_mut(&reservation.resource_key) {
                apply_delta(bucket, delta);
            }
        }
        {
            let mut ip_buckets = self.ip_buckets.lock().await;
            if let Some(bucket) = ip_buckets.get_mut(&reservation.ip) {
                apply_delta(bucket, delta);
            }
        }
    }

    /// Tops off both the resource and IP buckets named by a verified
    /// payment: `ceil(content_length / 1024) * capacity_multiplier` x402
    /// tokens added to each.
    pub async fn top_off(
        &self,
        ip: IpAddr,
        resource_key: &str,
        content_length: u64,
        capacity_multiplier: f64,
    ) {
        {
            let mut resource_buckets = self.resource_buckets.lock().await;
            let bucket = resource_buckets.get_or_insert_mut(resource_key.to_string(), || {
                TokenBucket::new(self.config.capacity, self.config.refill_rate)
            });
            bucket.top_off(content_length, capacity_multiplier);
        }
        {
            let mut ip_buckets = self.ip_buckets.lock().await;
            let bucket = ip_buckets.get_or_insert_mut(ip, || {
                TokenBucket::new(self.config.capacity, self.config.refill_rate)
            });
            bucket.top_off(content_length, capacity_multiplier);
        }
    }

    /// Grants `tokens` to the regular (non-x402) pool of both buckets
    /// named by an admin-authenticated manual top-off, clamped at
    /// capacity the same way a post-response refund is.
    pub async fn top_off_regular(&self, ip: IpAddr, resource_key: &str, tokens: f64) {
        {
            let mut resource_buckets = self.resource_buckets.lock().await;
            let bucket = resource_buckets.get_or_insert_mut(resource_key.to_string(), || {
                TokenBucket::new(self.config.capacity, self.config.refill_rate)
            });
            bucket.refund_regular(tokens);
        }
        {
            let mut ip_buckets = self.ip_buckets.lock().await;
            let bucket = ip_buckets.get_or_insert_mut(ip, || {
                TokenBucket::new(self.config.capacity, self.config.refill_rate)
            });
            bucket.refund_regular(tokens);
        }
    }

    pub async fn ip_bucket_state(&self, ip: IpAddr) -> Option<BucketSnapshot> {
        let mut buckets = self.ip_buckets.lock().await;
        buckets.peek_mut(&ip).map(|b| {
            b.refill();
            b.snapshot()
        })
    }

    pub async fn resource_bucket_state(&self, resource_key: &str) -> Option<BucketSnapshot> {
        let mut buckets = self.resource_buckets.lock().await;
        buckets.peek_mut(resource_key).map(|b| {
            b.refill();
            b.snapshot()
        })
    }
}

fn apply_delta(bucket: &mut TokenBucket, delta: f64) {
    if delta > 0.0 {
        bucket.force_consume(delta);
    } else if delta < 0.0 {
        bucket.refund_regular(-delta);
    }
}
