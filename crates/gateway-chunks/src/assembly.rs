use std::sync::Arc;

use async_stream::try_stream;
use bytes::Bytes;
use futures::Stream;
use gateway_core::error::{CancelReason, GatewayError};
use tokio_util::sync::CancellationToken;

use crate::composite::CompositeChunkSource;
use crate::locator::ChunkLocator;

/// Describes one contiguous transaction payload to reconstruct from chunks.
pub struct ChunkAssemblyRequest {
    pub data_root: [u8; 32],
    /// Absolute weave offset the transaction's payload begins at.
    pub tx_start_offset: u64,
    pub tx_size: u64,
    /// Optional `[start, end)` window relative to the transaction payload;
    /// whole chunks are still fetched, but bytes outside the window are
    /// trimmed before being emitted.
    pub range: Option<(u64, u64)>,
}

/// Turns a `(txStartOffset, txSize, dataRoot)` triple into a byte stream by
/// fetching validated chunks in ascending order through `source`.
///
/// Consumes at most one in-flight chunk's worth of memory ahead of the
/// consumer: the next chunk is requested only once this stream's current
/// item has been yielded, since each loop iteration awaits one
/// `fetch_validated` call before producing the next `Bytes`. Errors from any
/// chunk surface as a mid-stream `Err`, not a rejected future — bytes
/// already yielded are not rolled back.
pub fn assemble_stream(
    source: Arc<CompositeChunkSource>,
    request: ChunkAssemblyRequest,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Bytes, GatewayError>> {
    try_stream! {
        let (window_start, window_end) = request.range.unwrap_or((0, request.tx_size));
        let mut relative = 0u64;

        while relative < request.tx_size {
            if cancel.is_cancelled() {
                Err(GatewayError::Cancelled { reason: CancelReason::ClientDisconnect })?;
            }

            let locator = ChunkLocator {
                data_root: request.data_root,
                absolute_offset: request.tx_start_offset + relative,
                relative_offset: relative,
                tx_size: request.tx_size,
            };

            let chunk = source
                .fetch_validated(&locator, cancel.child_token())
                .await
                .map_err(|e| GatewayError::ChunkValidation(e.to_string()))?;

            let chunk_start = relative;
            let chunk_len = chunk.chunk.len() as u64;
            let chunk_end = chunk_start + chunk_len;
            relative = chunk_end;

            let emit_start = chunk_start.max(window_start);
            let emit_end = chunk_end.min(window_end);
            if emit_start < emit_end {
                let local_start = (emit_start - chunk_start) as usize;
                let local_end = (emit_end - chunk_start) as usize;
                yield Bytes::copy_from_slice(&chunk.chunk[local_start..local_end]);
            }

            if chunk_end >= window_end {
                break;
            }
        }
    }
}
