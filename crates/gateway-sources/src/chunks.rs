use std::sync::Arc;

use async_trait::async_trait;
use gateway_chunks::{assemble_stream, ChunkAssemblyRequest, CompositeChunkSource};
use gateway_core::{ContiguousData, Identifier};
use tokio_util::sync::CancellationToken;

use crate::error::TierError;
use crate::request::DataRequest;
use crate::tier::ContiguousDataTier;

/// Where a transaction's payload begins on the weave and how large it is.
/// Resolved out-of-band (from a transaction header cache, a trusted peer's
/// `/tx/{id}/offset`, or similar) before chunk assembly can start.
#[derive(Debug, Clone, Copy)]
pub struct TxLocation {
    pub data_root: [u8; 32],
    pub start_offset: u64,
    pub size: u64,
}

/// Resolves an identifier to the weave location chunk assembly needs.
#[async_trait]
pub trait TxOffsetResolver: Send + Sync {
    async fn resolve(&self, id: &Identifier) -> Option<TxLocation>;
}

/// The last-resort tier: reconstructs a transaction's payload chunk by
/// chunk, validating each against its Merkle proof. Unlike every other
/// tier this one always sets `verified = true`, since assembly cannot
/// succeed without validating every chunk along the way.
pub struct ChunkAssemblyTier {
    source: Arc<CompositeChunkSource>,
    offsets: Arc<dyn TxOffsetResolver>,
}

impl ChunkAssemblyTier {
    pub fn new(source: Arc<CompositeChunkSource>, offsets: Arc<dyn TxOffsetResolver>) -> Self {
        Self { source, offsets }
    }
}

#[async_trait]
impl ContiguousDataTier for ChunkAssemblyTier {
    async fn fetch(
        &self,
        req: &DataRequest,
        cancel: CancellationToken,
    ) -> Result<ContiguousData, TierError> {
        let location = self.offsets.resolve(&req.id).await.ok_or_else(|| TierError::NotFound {
            tier: self.name().to_string(),
        })?;

        let range = req.region.map(|region| (region.offset, region.end()));
        let size = match req.region {
            Some(region) => region.size,
            None => location.size,
        };

        let request = ChunkAssemblyRequest {
            data_root: location.data_root,
            tx_start_offset: location.start_offset,
            tx_size: location.size,
            range,
        };
        let stream = assemble_stream(Arc::clone(&self.source), request, cancel);

        Ok(ContiguousData {
            stream: Box::pin(stream),
            size,
            source_content_type: None,
            verified: true,
            trusted: true,
            cached: false,
            request_attributes: None,
        })
    }

    fn name(&self) -> &str {
        "chunks"
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::StreamExt;
    use gateway_chunks::ChunkSource;
    use gateway_core::hash::{sha256, sha256_concat};
    use gateway_core::{Chunk, Identifier};
    use gateway_chunks::error::ChunkSourceError;
    use gateway_chunks::locator::ChunkLocator;

    use super::*;

    fn sample_id() -> Identifier {
        "A".repeat(43).parse().unwrap()
    }

    fn be32(offset: u64) -> [u8; 32] {
        let mut field = [0u8; 32];
        field[24..].copy_from_slice(&offset.to_be_bytes());
        field
    }

    fn single_chunk_tree(data: &[u8]) -> ([u8; 32], Chunk) {
        let total = data.len() as u64;
        let hash = sha256(data);
        let offset_field = be32(total);
        let leaf_hash = sha256_concat(&[&sha256(&hash), &sha256(&offset_field)]);
        let mut path = Vec::new();
        path.extend_from_slice(&hash);
        path.extend_from_slice(&offset_field);
        let chunk = Chunk {
            data_root: leaf_hash,
            data_size: total,
            data_path: path,
            tx_path: None,
            offset: total,
            hash,
            chunk: data.to_vec(),
        };
        (leaf_hash, chunk)
    }

    struct OneChunkSource(Chunk);

    #[async_trait]
    impl ChunkSource for OneChunkSource {
        async fn fetch_chunk(
            &self,
            _locator: &ChunkLocator,
            _cancel: CancellationToken,
        ) -> Result<Chunk, ChunkSourceError> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &str {
            "single"
        }
    }

    struct StaticResolver(TxLocation);

    #[async_trait]
    impl TxOffsetResolver for StaticResolver {
        async fn resolve(&self, _id: &Identifier) -> Option<TxLocation> {
            Some(self.0)
        }
    }

    #[tokio::test]
    async fn assembles_whole_payload_and_marks_verified() {
        let data = b"weave payload".to_vec();
        let (root, chunk) = single_chunk_tree(&data);
        let source = Arc::new(CompositeChunkSource::new(
            vec![Box::new(OneChunkSource(chunk))],
            1,
        ));
        let resolver = Arc::new(StaticResolver(TxLocation {
            data_root: root,
            start_offset: 0,
            size: data.len() as u64,
        }));
        let tier = ChunkAssemblyTier::new(source, resolver);

        let req = DataRequest::new(sample_id());
        let mut result = tier.fetch(&req, CancellationToken::new()).await.unwrap();
        assert!(result.verified);
        let mut collected = Vec::new();
        while let Some(item) = result.stream.next().await {
            collected.extend_from_slice(&item.unwrap());
        }
        assert_eq!(collected, data);
    }

    #[tokio::test]
    async fn unresolved_identifier_is_not_found() {
        struct NeverResolves;
        #[async_trait]
        impl TxOffsetResolver for NeverResolves {
            async fn resolve(&self, _id: &Identifier) -> Option<TxLocation> {
                None
            }
        }
        let source = Arc::new(CompositeChunkSource::new(vec![], 1));
        let tier = ChunkAssemblyTier::new(source, Arc::new(NeverResolves));
        let req = DataRequest::new(sample_id());
        let err = tier.fetch(&req, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TierError::NotFound { .. }));
    }
}
