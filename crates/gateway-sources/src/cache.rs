use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use gateway_core::ContiguousData;
use tokio_util::sync::CancellationToken;

use crate::error::TierError;
use crate::request::DataRequest;
use crate::tier::ContiguousDataTier;

/// Local filesystem content cache: the fastest tier, tried first.
///
/// Files are stored flat under `root`, keyed by the identifier's wire
/// string. A full hit serves the whole file; a ranged request seeks and
/// reads only the requested window rather than reading the file in full.
pub struct CacheTier {
    root: PathBuf,
}

impl CacheTier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &gateway_core::Identifier) -> PathBuf {
        self.root.join(id.to_wire_string())
    }

    /// Writes `bytes` into the cache for `id`, creating the cache directory
    /// if needed. Used by upstream tiers to populate the cache on a miss.
    pub async fn put(
        &self,
        id: &gateway_core::Identifier,
        bytes: &[u8],
    ) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(id), bytes).await
    }
}

#[async_trait]
impl ContiguousDataTier for CacheTier {
    async fn fetch(
        &self,
        req: &DataRequest,
        _cancel: CancellationToken,
    ) -> Result<ContiguousData, TierError> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let path = self.path_for(&req.id);
        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TierError::NotFound {
                    tier: self.name().to_string(),
                }
            } else {
                TierError::Transient {
                    tier: self.name().to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let total_size = file
            .metadata()
            .await
            .map_err(|e| TierError::Transient {
                tier: self.name().to_string(),
                message: e.to_string(),
            })?
            .len();

        let (start, len) = match req.region {
            Some(region) => {
                if !region.fits_within(total_size) {
                    return Err(TierError::Terminal {
                        tier: self.name().to_string(),
                        message: "requested region exceeds cached file size".to_string(),
                    });
                }
                (region.offset, region.size)
            }
            None => (0, total_size),
        };

        if start > 0 {
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| TierError::Transient {
                    tier: self.name().to_string(),
                    message: e.to_string(),
                })?;
        }

        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf).await.map_err(|e| TierError::Transient {
            tier: self.name().to_string(),
            message: e.to_string(),
        })?;

        Ok(ContiguousData::from_bytes(
            Bytes::from(buf),
            None,
            false,
            true,
            true,
        ))
    }

    fn name(&self) -> &str {
        "cache"
    }
}
