use futures::stream::FuturesUnordered;
use futures::StreamExt;
use gateway_core::Chunk;
use tokio_util::sync::CancellationToken;

use crate::error::AllSourcesFailed;
use crate::locator::ChunkLocator;
use crate::source::ChunkSource;
use crate::validate::validate_chunk;

/// Fetches a single chunk from the first of several underlying sources to
/// produce one that passes Merkle/hash validation.
///
/// `parallelism == 1` tries sources strictly in order (sequential mode).
/// `parallelism > 1` keeps up to that many requests in flight; the first
/// validated success cancels its siblings.
pub struct CompositeChunkSource {
    sources: Vec<Box<dyn ChunkSource>>,
    parallelism: usize,
}

impl CompositeChunkSource {
    pub fn new(sources: Vec<Box<dyn ChunkSource>>, parallelism: usize) -> Self {
        let bound = sources.len().max(1);
        Self {
            sources,
            parallelism: parallelism.clamp(1, bound),
        }
    }

    pub async fn fetch_validated(
        &self,
        locator: &ChunkLocator,
        cancel: CancellationToken,
    ) -> Result<Chunk, AllSourcesFailed> {
        if self.parallelism <= 1 {
            self.fetch_sequential(locator, cancel).await
        } else {
            self.fetch_bounded_parallel(locator, cancel).await
        }
    }

    async fn fetch_sequential(
        &self,
        locator: &ChunkLocator,
        cancel: CancellationToken,
    ) -> Result<Chunk, AllSourcesFailed> {
        let mut errors = Vec::new();
        for source in &self.sources {
            if cancel.is_cancelled() {
                errors.push(format!("{}: cancelled", source.name()));
                break;
            }
            match source.fetch_chunk(locator, cancel.child_token()).await {
                Ok(chunk) => match validate_chunk(&chunk, locator) {
                    Ok(()) => return Ok(chunk),
                    Err(e) => errors.push(format!("{}: {e}", source.name())),
                },
                Err(e) => errors.push(format!("{}: {e}", source.name())),
            }
        }
        Err(AllSourcesFailed {
            attempted: self.sources.len(),
            errors,
        })
    }

    async fn fetch_bounded_parallel(
        &self,
        locator: &ChunkLocator,
        cancel: CancellationToken,
    ) -> Result<Chunk, AllSourcesFailed> {
        let mut next_index = 0usize;
        let mut child_tokens: Vec<CancellationToken> = Vec::new();
        let mut in_flight = FuturesUnordered::new();
        let mut errors = Vec::new();

        while next_index < self.sources.len() && in_flight.len() < self.parallelism {
            let child = cancel.child_token();
            child_tokens.push(child.clone());
            let idx = next_index;
            in_flight.push(async move {
                let result = self.sources[idx].fetch_chunk(locator, child).await;
                (idx, result)
            });
            next_index += 1;
        }

        while let Some((idx, result)) = in_flight.next().await {
            match result {
                Ok(chunk) => match validate_chunk(&chunk, locator) {
                    Ok(()) => {
                        for token in &child_tokens {
                            token.cancel();
                        }
                        return Ok(chunk);
                    }
                    Err(e) => errors.push(format!("{}: {e}", self.sources[idx].name())),
                },
                Err(e) => errors.push(format!("{}: {e}", self.sources[idx].name())),
            }

            if next_index < self.sources.len() {
                let child = cancel.child_token();
                child_tokens.push(child.clone());
                let idx = next_index;
                in_flight.push(async move {
                    let result = self.sources[idx].fetch_chunk(locator, child).await;
                    (idx, result)
                });
                next_index += 1;
            }
        }

        Err(AllSourcesFailed {
            attempted: self.sources.len(),
            errors,
        })
    }
}
