use thiserror::Error;

use crate::identifier::IdentifierError;

/// Why a cancellation happened, so callers can tell a slow client apart
/// from an internal deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    ClientDisconnect,
    Timeout,
}

/// The shared error type returned from every tier and surfaced at the
/// HTTP boundary as a status code and a `{error, message}` body.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("not found")]
    NotFound,

    #[error("request cannot be satisfied: {0}")]
    Unsatisfiable(String),

    #[error("upstream error, retry may succeed: {0}")]
    UpstreamTransient(String),

    #[error("upstream error, retry will not help: {0}")]
    UpstreamTerminal(String),

    #[error("chunk failed validation: {0}")]
    ChunkValidation(String),

    #[error("cancelled: {reason:?}")]
    Cancelled { reason: CancelReason },

    #[error("payment required")]
    PaymentRequired,

    #[error("rate limited")]
    RateLimited,

    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(u64),
}

impl GatewayError {
    /// Whether retrying the same request against a different upstream
    /// might succeed. `NotFound` is included: a cascade tries its next
    /// tier on `NotFound` just as it does on `UpstreamTransient`.
    pub fn is_retryable_by_next_tier(&self) -> bool {
        matches!(
            self,
            GatewayError::NotFound
                | GatewayError::UpstreamTransient(_)
                | GatewayError::ChunkValidation(_)
        )
    }

    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::InvalidIdentifier(_) => 400,
            GatewayError::NotFound => 404,
            GatewayError::Unsatisfiable(_) => 416,
            GatewayError::UpstreamTransient(_) => 502,
            GatewayError::UpstreamTerminal(_) => 502,
            GatewayError::ChunkValidation(_) => 502,
            GatewayError::Cancelled {
                reason: CancelReason::ClientDisconnect,
            } => 499,
            GatewayError::Cancelled {
                reason: CancelReason::Timeout,
            } => 504,
            GatewayError::PaymentRequired => 402,
            GatewayError::RateLimited => 429,
            GatewayError::PayloadTooLarge(_) => 413,
        }
    }
}
