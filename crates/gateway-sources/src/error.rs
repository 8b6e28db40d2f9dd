use thiserror::Error;

/// Per-tier failure classification. The composite converts the aggregate
/// of these into `GatewayError::UpstreamTransient`/`UpstreamTerminal` only
/// once every configured tier has been exhausted.
#[derive(Debug, Error)]
pub enum TierError {
    #[error("{tier}: not found")]
    NotFound { tier: String },
    #[error("{tier}: transient failure: {message}")]
    Transient { tier: String, message: String },
    #[error("{tier}: terminal failure: {message}")]
    Terminal { tier: String, message: String },
    #[error("{tier}: cancelled by client disconnect")]
    ClientDisconnect { tier: String },
}

impl TierError {
    pub fn tier(&self) -> &str {
        match self {
            TierError::NotFound { tier }
            | TierError::Transient { tier, .. }
            | TierError::Terminal { tier, .. }
            | TierError::ClientDisconnect { tier } => tier,
        }
    }

    /// Whether the composite should keep trying the next configured tier.
    pub fn is_retryable_by_next_tier(&self) -> bool {
        !matches!(self, TierError::ClientDisconnect { .. })
    }
}

/// Raised when every configured tier has failed.
#[derive(Debug, Error)]
#[error("all {attempted} tier(s) failed: {}", .errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
pub struct AllTiersFailed {
    pub attempted: usize,
    pub errors: Vec<TierError>,
}

#[cfg(test)]
mod tests {
    use super::TierError;

    #[test]
    fn client_disconnect_is_not_retryable_by_next_tier() {
        let err = TierError::ClientDisconnect {
            tier: "cache".to_string(),
        };
        assert!(!err.is_retryable_by_next_tier());
    }

    #[test]
    fn not_found_is_retryable_by_next_tier() {
        let err = TierError::NotFound {
            tier: "cache".to_string(),
        };
        assert!(err.is_retryable_by_next_tier());
    }
}
