use std::path::{Path, PathBuf};

use gateway_core::ChunkMetadata;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt metadata record: {0}")]
    Corrupt(String),
}

/// Filesystem-backed store for [`ChunkMetadata`], keyed primarily by
/// `(data_root, relative_offset)`. A secondary index keyed by absolute
/// weave offset is maintained as a symlink to the primary record; creating
/// it is best-effort and never fails the write.
pub struct ChunkMetadataStore {
    root: PathBuf,
}

impl ChunkMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn primary_path(&self, data_root: &[u8; 32], relative_offset: u64) -> PathBuf {
        self.root
            .join("by_root")
            .join(hex::encode(data_root))
            .join(relative_offset.to_string())
    }

    fn secondary_path(&self, absolute_offset: u64) -> PathBuf {
        self.root.join("by_offset").join(absolute_offset.to_string())
    }

    pub async fn put(
        &self,
        metadata: &ChunkMetadata,
        absolute_offset: u64,
    ) -> Result<(), ChunkStoreError> {
        let primary = self.primary_path(&metadata.data_root, metadata.offset);
        if let Some(parent) = primary.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec(metadata)
            .map_err(|e| ChunkStoreError::Corrupt(e.to_string()))?;
        tokio::fs::write(&primary, body).await?;

        self.link_secondary(absolute_offset, &primary).await;
        Ok(())
    }

    async fn link_secondary(&self, absolute_offset: u64, primary: &Path) {
        let secondary = self.secondary_path(absolute_offset);
        if let Some(parent) = secondary.parent() {
            if tokio::fs::create_dir_all(parent).await.is_err() {
                return;
            }
        }
        let _ = tokio::fs::remove_file(&secondary).await;
        #[cfg(unix)]
        {
            let _ = tokio::fs::symlink(primary, &secondary).await;
        }
    }

    pub async fn get_by_root(
        &self,
        data_root: &[u8; 32],
        relative_offset: u64,
    ) -> Result<Option<ChunkMetadata>, ChunkStoreError> {
        let path = self.primary_path(data_root, relative_offset);
        self.read_record(&path).await
    }

    pub async fn get_by_absolute_offset(
        &self,
        absolute_offset: u64,
    ) -> Result<Option<ChunkMetadata>, ChunkStoreError> {
        let path = self.secondary_path(absolute_offset);
        self.read_record(&path).await
    }

    async fn read_record(&self, path: &Path) -> Result<Option<ChunkMetadata>, ChunkStoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let metadata = serde_json::from_slice(&bytes)
                    .map_err(|e| ChunkStoreError::Corrupt(e.to_string()))?;
                Ok(Some(metadata))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkMetadataStore;
    use gateway_core::ChunkMetadata;

    fn sample(offset: u64) -> ChunkMetadata {
        ChunkMetadata {
            data_root: [7u8; 32],
            data_size: 1024,
            offset,
            data_path: vec![1, 2, 3],
            hash: [9u8; 32],
        }
    }

    #[tokio::test]
    async fn put_then_get_by_root_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkMetadataStore::new(dir.path());
        let metadata = sample(256 * 1024);
        store.put(&metadata, 5_000_000).await.unwrap();

        let fetched = store
            .get_by_root(&metadata.data_root, metadata.offset)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.offset, metadata.offset);
        assert_eq!(fetched.data_root, metadata.data_root);
    }

    #[tokio::test]
    async fn secondary_index_resolves_by_absolute_offset() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkMetadataStore::new(dir.path());
        let metadata = sample(0);
        store.put(&metadata, 123_456).await.unwrap();

        let fetched = store.get_by_absolute_offset(123_456).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().data_root, metadata.data_root);
    }

    #[tokio::test]
    async fn missing_key_returns_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkMetadataStore::new(dir.path());
        let result = store.get_by_root(&[1u8; 32], 0).await.unwrap();
        assert!(result.is_none());
    }
}
