use async_trait::async_trait;
use gateway_core::Chunk;
use tokio_util::sync::CancellationToken;

use crate::error::ChunkSourceError;
use crate::locator::ChunkLocator;

/// One upstream capable of producing a chunk's bytes plus its Merkle proof.
/// Implementations are not responsible for validating the chunk; the
/// composite source does that uniformly after any source returns one.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn fetch_chunk(
        &self,
        locator: &ChunkLocator,
        cancel: CancellationToken,
    ) -> Result<Chunk, ChunkSourceError>;

    /// A short label for telemetry and aggregated-failure messages.
    fn name(&self) -> &str;
}
