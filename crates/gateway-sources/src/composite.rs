use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use gateway_core::{CancelReason, ContiguousData, GatewayError};

use crate::error::{AllTiersFailed, TierError};
use crate::request::DataRequest;
use crate::tier::ContiguousDataTier;

/// Cascades a [`DataRequest`] through an ordered list of tiers: cache, then
/// object store, then trusted peer gateways, then chunk assembly from the
/// weave. Tiers are tried strictly in order; the first to produce data wins.
///
/// A tier reporting `NotFound` or a transient upstream failure falls through
/// to the next tier. A client disconnect aborts the whole cascade
/// immediately, since no further tier's answer could ever reach the caller.
pub struct CompositeSource {
    tiers: Vec<Box<dyn ContiguousDataTier>>,
}

impl CompositeSource {
    pub fn new(tiers: Vec<Box<dyn ContiguousDataTier>>) -> Self {
        Self { tiers }
    }

    pub async fn fetch(
        &self,
        req: &DataRequest,
        cancel: CancellationToken,
    ) -> Result<ContiguousData, GatewayError> {
        let mut errors = Vec::with_capacity(self.tiers.len());

        for tier in &self.tiers {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled {
                    reason: CancelReason::ClientDisconnect,
                });
            }

            let attempt = cancel.child_token();
            match tier.fetch(req, attempt).await {
                Ok(data) => {
                    debug!(tier = tier.name(), id = %req.id, "tier served request");
                    return Ok(data);
                }
                Err(err) => {
                    let retryable = err.is_retryable_by_next_tier();
                    warn!(tier = tier.name(), id = %req.id, error = %err, retryable, "tier failed");
                    let stop_everything = matches!(err, TierError::ClientDisconnect { .. });
                    errors.push(err);
                    if stop_everything {
                        return Err(GatewayError::Cancelled {
                            reason: CancelReason::ClientDisconnect,
                        });
                    }
                    if !retryable {
                        continue;
                    }
                }
            }
        }

        Err(aggregate(errors, self.tiers.len()).into())
    }
}

fn aggregate(errors: Vec<TierError>, attempted: usize) -> AllTiersFailed {
    AllTiersFailed { attempted, errors }
}

impl From<AllTiersFailed> for GatewayError {
    fn from(err: AllTiersFailed) -> Self {
        if err.errors.is_empty() {
            return GatewayError::NotFound;
        }
        if err
            .errors
            .iter()
            .all(|e| matches!(e, TierError::NotFound { .. }))
        {
            return GatewayError::NotFound;
        }
        GatewayError::UpstreamTransient(err.to_string())
    }
}
