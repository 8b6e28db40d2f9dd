use async_trait::async_trait;
use gateway_core::ContiguousData;
use tokio_util::sync::CancellationToken;

use crate::error::TierError;
use crate::request::DataRequest;

/// One retrieval tier in the composite cascade (cache, S3, trusted
/// gateways, chunk assembly). Tiers are polymorphic — the composite knows
/// only this interface.
#[async_trait]
pub trait ContiguousDataTier: Send + Sync {
    async fn fetch(
        &self,
        req: &DataRequest,
        cancel: CancellationToken,
    ) -> Result<ContiguousData, TierError>;

    /// A short label identifying this tier in telemetry and aggregated
    /// failure messages.
    fn name(&self) -> &str;
}
