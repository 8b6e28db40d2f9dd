use std::sync::Arc;

use async_trait::async_trait;
use gateway_chunks::{ChunkLocator, ChunkSource, ChunkSourceError};
use gateway_codec::base64url;
use gateway_core::Chunk;
use gateway_peers::{PeerCategory, PeerManager};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Wire form of `GET /chunk/{absoluteOffset}`: base64url-encoded fields,
/// per the chunk peer endpoint contract.
#[derive(Debug, Deserialize)]
struct ChunkResponse {
    chunk: String,
    data_path: String,
    #[serde(default)]
    tx_path: Option<String>,
}

/// Fetches a chunk from whichever `getChunk` peer the peer manager selects
/// for the locator's absolute offset, reporting success/failure back into
/// the weighted pool.
pub struct PeerChunkSource {
    peers: Arc<PeerManager>,
    http: reqwest::Client,
    candidates_per_attempt: usize,
}

impl PeerChunkSource {
    pub fn new(peers: Arc<PeerManager>, http: reqwest::Client, candidates_per_attempt: usize) -> Self {
        Self {
            peers,
            http,
            candidates_per_attempt: candidates_per_attempt.max(1),
        }
    }
}

#[async_trait]
impl ChunkSource for PeerChunkSource {
    async fn fetch_chunk(
        &self,
        locator: &ChunkLocator,
        cancel: CancellationToken,
    ) -> Result<Chunk, ChunkSourceError> {
        let candidates = self
            .peers
            .select_peers_for_offset(locator.absolute_offset, self.candidates_per_attempt)
            .await;
        if candidates.is_empty() {
            return Err(ChunkSourceError::Transient("no getChunk peers available".to_string()));
        }

        let mut last_error = None;
        for candidate in candidates {
            if cancel.is_cancelled() {
                return Err(ChunkSourceError::Cancelled);
            }
            match self.fetch_from(&candidate.id, locator, &cancel).await {
                Ok(chunk) => {
                    self.peers
                        .report_success(PeerCategory::GetChunk, &candidate.id)
                        .await;
                    return Ok(chunk);
                }
                Err(err) => {
                    debug!(peer = %candidate.id, error = %err, "getChunk candidate failed");
                    self.peers
                        .report_failure(PeerCategory::GetChunk, &candidate.id)
                        .await;
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ChunkSourceError::Transient("all getChunk candidates failed".to_string())))
    }

    fn name(&self) -> &str {
        "peer-chunk"
    }
}

impl PeerChunkSource {
    async fn fetch_from(
        &self,
        peer_url: &str,
        locator: &ChunkLocator,
        cancel: &CancellationToken,
    ) -> Result<Chunk, ChunkSourceError> {
        let url = format!("{peer_url}/chunk/{}", locator.absolute_offset);
        let response = tokio::select! {
            result = self.http.get(&url).send() => {
                result.map_err(|e| ChunkSourceError::Transient(e.to_string()))?
            }
            _ = cancel.cancelled() => return Err(ChunkSourceError::Cancelled),
        };
        if !response.status().is_success() {
            return Err(ChunkSourceError::Transient(format!(
                "{peer_url} returned {}",
                response.status()
            )));
        }
        let body: ChunkResponse = response
            .json()
            .await
            .map_err(|e| ChunkSourceError::Transient(e.to_string()))?;

        let chunk_bytes = base64url::decode(&body.chunk)
            .map_err(|e| ChunkSourceError::Validation(e.to_string()))?;
        let data_path = base64url::decode(&body.data_path)
            .map_err(|e| ChunkSourceError::Validation(e.to_string()))?;
        let tx_path = body
            .tx_path
            .as_deref()
            .map(base64url::decode)
            .transpose()
            .map_err(|e| ChunkSourceError::Validation(e.to_string()))?;

        Ok(Chunk {
            data_root: locator.data_root,
            data_size: locator.tx_size,
            data_path,
            tx_path,
            offset: locator.relative_offset + chunk_bytes.len() as u64,
            hash: gateway_core::hash::sha256(&chunk_bytes),
            chunk: chunk_bytes,
        })
    }
}
