use serde::{Deserialize, Serialize};

/// Forwarded per-request metadata propagated via headers across hops.
///
/// `hops` increments by one each time a request leaves the gateway for an
/// upstream; a request whose incoming `hops` is already at or beyond the
/// configured maximum must not be forwarded further.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAttributes {
    pub hops: u32,
    pub origin: Option<String>,
    pub origin_release: Option<String>,
    pub arns_name: Option<String>,
    pub arns_basename: Option<String>,
    pub arns_record: Option<String>,
}

impl RequestAttributes {
    /// Returns a copy with `hops` incremented by one, for forwarding to an
    /// upstream.
    pub fn incremented(&self) -> Self {
        Self {
            hops: self.hops + 1,
            ..self.clone()
        }
    }

    /// Whether this request is still eligible to be forwarded given
    /// `max_hops`.
    pub fn may_forward(&self, max_hops: u32) -> bool {
        self.hops < max_hops
    }
}

#[cfg(test)]
mod tests {
    use super::RequestAttributes;

    #[test]
    fn hops_at_or_above_max_may_not_forward() {
        let attrs = RequestAttributes {
            hops: 3,
            ..Default::default()
        };
        assert!(!attrs.may_forward(3));
        assert!(!attrs.may_forward(2));
        assert!(attrs.may_forward(4));
    }

    #[test]
    fn incremented_preserves_other_fields() {
        let attrs = RequestAttributes {
            hops: 1,
            origin: Some("origin.example".to_string()),
            ..Default::default()
        };
        let next = attrs.incremented();
        assert_eq!(next.hops, 2);
        assert_eq!(next.origin, attrs.origin);
    }
}
