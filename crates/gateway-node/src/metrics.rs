use std::sync::atomic::{AtomicU64, Ordering};

/// Process-local counters exposed on `/metrics`, one line per counter, in
/// the same bare-text format the teacher's `metrics_body` renders — no
/// external metrics registry, per the CORE's scope.
#[derive(Default)]
pub struct GatewayMetrics {
    pub tier_success: AtomicU64,
    pub tier_failure: AtomicU64,
    pub all_tiers_failed: AtomicU64,
    pub admission_allowed: AtomicU64,
    pub admission_denied_rate_limit: AtomicU64,
    pub admission_denied_payment: AtomicU64,
    pub payment_verified: AtomicU64,
    pub payment_failed: AtomicU64,
    pub peer_refresh_ok: AtomicU64,
    pub peer_refresh_failed: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tier_success(&self) {
        self.tier_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tier_failure(&self) {
        self.tier_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_all_tiers_failed(&self) {
        self.all_tiers_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admission_allowed(&self) {
        self.admission_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admission_denied_rate_limit(&self) {
        self.admission_denied_rate_limit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admission_denied_payment(&self) {
        self.admission_denied_payment.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payment_verified(&self) {
        self.payment_verified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payment_failed(&self) {
        self.payment_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_refresh_ok(&self) {
        self.peer_refresh_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_refresh_failed(&self) {
        self.peer_refresh_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Renders every counter as `name value\n`, matching the teacher's
    /// `/metrics` line format.
    pub fn render(&self) -> String {
        format!(
            "gateway_tier_success_total {}\n\
             gateway_tier_failure_total {}\n\
             gateway_all_tiers_failed_total {}\n\
             gateway_admission_allowed_total {}\n\
             gateway_admission_denied_rate_limit_total {}\n\
             gateway_admission_denied_payment_total {}\n\
             gateway_payment_verified_total {}\n\
             gateway_payment_failed_total {}\n\
             gateway_peer_refresh_ok_total {}\n\
             gateway_peer_refresh_failed_total {}\n",
            self.tier_success.load(Ordering::Relaxed),
            self.tier_failure.load(Ordering::Relaxed),
            self.all_tiers_failed.load(Ordering::Relaxed),
            self.admission_allowed.load(Ordering::Relaxed),
            self.admission_denied_rate_limit.load(Ordering::Relaxed),
            self.admission_denied_payment.load(Ordering::Relaxed),
            self.payment_verified.load(Ordering::Relaxed),
            self.payment_failed.load(Ordering::Relaxed),
            self.peer_refresh_ok.load(Ordering::Relaxed),
            self.peer_refresh_failed.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::GatewayMetrics;

    #[test]
    fn counters_start_at_zero_and_render_one_line_each() {
        let metrics = GatewayMetrics::new();
        let rendered = metrics.render();
        assert_eq!(rendered.lines().count(), 10);
        assert!(rendered.contains("gateway_tier_success_total 0"));
    }

    #[test]
    fn recording_increments_the_matching_counter_only() {
        let metrics = GatewayMetrics::new();
        metrics.record_tier_success();
        metrics.record_tier_success();
        metrics.record_admission_denied_rate_limit();
        let rendered = metrics.render();
        assert!(rendered.contains("gateway_tier_success_total 2"));
        assert!(rendered.contains("gateway_admission_denied_rate_limit_total 1"));
        assert!(rendered.contains("gateway_tier_failure_total 0"));
    }
}
