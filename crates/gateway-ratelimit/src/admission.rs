use std::net::IpAddr;

use crate::allowlist::Allowlist;
use crate::config::RateLimiterConfig;
use crate::limiter::{AdmissionOutcome, LimitType, RateLimiter, Reservation};

/// Outcome of the admission gate's check-reserve-adjust protocol.
pub enum AdmissionDecision {
    /// The caller's IP is on the allowlist; no tokens were reserved.
    Allowlisted,
    Admitted(Reservation),
    Denied(LimitType),
}

/// Wraps a [`RateLimiter`] with an IP allowlist, matching the admission
/// algorithm: allowlisted callers bypass rate limiting entirely, everyone
/// else goes through check-and-reserve against both bucket pools.
pub struct AdmissionGate {
    limiter: RateLimiter,
    allowlist: Allowlist,
}

impl AdmissionGate {
    pub fn new(config: RateLimiterConfig, allowlist: Allowlist) -> Self {
        Self {
            limiter: RateLimiter::new(config),
            allowlist,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Step 1-6 of the admission algorithm: allowlist bypass, then
    /// predicted-size reservation against the resource bucket then the IP
    /// bucket.
    pub async fn admit(
        &self,
        ip: IpAddr,
        resource_key: String,
        predicted_size_bytes: u64,
    ) -> AdmissionDecision {
        if self.allowlist.contains(&ip) {
            return AdmissionDecision::Allowlisted;
        }
        let predicted = self.limiter.predicted_tokens(predicted_size_bytes);
        match self
            .limiter
            .check_and_reserve(ip, resource_key, predicted)
            .await
        {
            AdmissionOutcome::Admitted(reservation) => AdmissionDecision::Admitted(reservation),
            AdmissionOutcome::Denied(limit) => AdmissionDecision::Denied(limit),
        }
    }

    /// Post-response reconciliation once the actual response size is known.
    /// A no-op for allowlisted callers, which never hold a reservation.
    pub async fn adjust(&self, reservation: &Reservation, actual_size_bytes: u64) {
        let actual = self.limiter.predicted_tokens(actual_size_bytes);
        self.limiter.adjust(reservation, actual).await;
    }

    /// Applies a verified payment's top-off to both of `ip`/`resource_key`'s
    /// buckets.
    pub async fn record_payment(
        &self,
        ip: IpAddr,
        resource_key: &str,
        content_length: u64,
        capacity_multiplier: f64,
    ) {
        self.limiter
            .top_off(ip, resource_key, content_length, capacity_multiplier)
            .await;
    }

    /// Applies an admin-authenticated manual grant of regular (non-x402)
    /// tokens to both of `ip`/`resource_key`'s buckets, per the rate-limit
    /// admin surface's `tokenType: "regular"` top-off.
    pub async fn record_manual_grant(&self, ip: IpAddr, resource_key: &str, tokens: f64) {
        self.limiter.top_off_regular(ip, resource_key, tokens).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn gate(allowlist: Allowlist) -> AdmissionGate {
        AdmissionGate::new(
            RateLimiterConfig {
                capacity: 100.0,
                refill_rate: 10.0,
                max_buckets: NonZeroUsize::new(1_000).unwrap(),
            },
            allowlist,
        )
    }

    #[tokio::test]
    async fn allowlisted_ip_bypasses_reservation() {
        let gate = gate(Allowlist::new(["10.0.0.1"]));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let decision = gate
            .admit(ip, "GET|example.com|/x".to_string(), 1024)
            .await;
        assert!(matches!(decision, AdmissionDecision::Allowlisted));
    }

    #[tokio::test]
    async fn non_allowlisted_ip_without_payment_is_denied_past_capacity() {
        let gate = gate(Allowlist::new(Vec::<&str>::new()));
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        let key = "GET|example.com/".to_string();
        // 1,048,576 bytes predicts to 1024 tokens, far past the 100 capacity.
        let decision = gate.admit(ip, key, 1_048_576).await;
        assert!(matches!(
            decision,
            AdmissionDecision::Denied(LimitType::Resource)
        ));
    }

    #[tokio::test]
    async fn payment_enables_admission_that_would_otherwise_be_denied() {
        let gate = gate(Allowlist::new(Vec::<&str>::new()));
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        let key = "GET|example.com|/paid".to_string();
        gate.record_payment(ip, &key, 1_048_576, 2.0).await;
        let decision = gate.admit(ip, key, 1_048_576).await;
        assert!(matches!(decision, AdmissionDecision::Admitted(_)));
    }
}
