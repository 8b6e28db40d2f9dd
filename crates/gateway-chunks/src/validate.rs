use gateway_core::{hash::sha256, Chunk};

use gateway_codec::merkle::validate_path;

use crate::error::ChunkSourceError;
use crate::locator::ChunkLocator;

/// Validates a chunk returned by a source against its locator: the Merkle
/// path from `data_root` to the chunk's leaf must resolve at
/// `relative_offset`, the leaf's declared end-offset must equal
/// `relative_offset + len(chunk bytes)`, and `sha256(chunk bytes)` must
/// equal both the chunk's declared hash and the proof leaf's chunk hash.
pub fn validate_chunk(chunk: &Chunk, locator: &ChunkLocator) -> Result<(), ChunkSourceError> {
    let boundary = validate_path(&chunk.data_root, &chunk.data_path, locator.relative_offset)
        .map_err(|e| ChunkSourceError::Validation(e.to_string()))?
        .ok_or_else(|| ChunkSourceError::Validation("merkle path did not validate".to_string()))?;

    let expected_end = locator.relative_offset + chunk.chunk.len() as u64;
    if boundary.end_offset != expected_end {
        return Err(ChunkSourceError::Validation(
            "chunk length inconsistent with proof leaf's end offset".to_string(),
        ));
    }

    let actual_hash = sha256(&chunk.chunk);
    if actual_hash != chunk.hash {
        return Err(ChunkSourceError::Validation(
            "sha256(chunk bytes) does not match declared hash".to_string(),
        ));
    }
    if actual_hash != boundary.chunk_hash {
        return Err(ChunkSourceError::Validation(
            "sha256(chunk bytes) does not match the proof leaf's hash".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_chunk;
    use crate::locator::ChunkLocator;
    use gateway_core::hash::{sha256, sha256_concat};
    use gateway_core::Chunk;

    fn be32(offset: u64) -> [u8; 32] {
        let mut field = [0u8; 32];
        field[24..].copy_from_slice(&offset.to_be_bytes());
        field
    }

    /// Builds a single-leaf Merkle proof covering `bytes` as one chunk
    /// starting at relative offset 0, returning `(root, data_path, hash)`.
    fn single_leaf_proof(bytes: &[u8]) -> ([u8; 32], Vec<u8>, [u8; 32]) {
        let chunk_hash = sha256(bytes);
        let end_offset = be32(bytes.len() as u64);
        let root = sha256_concat(&[&sha256(&chunk_hash), &sha256(&end_offset)]);
        let mut data_path = Vec::new();
        data_path.extend_from_slice(&chunk_hash);
        data_path.extend_from_slice(&end_offset);
        (root, data_path, chunk_hash)
    }

    #[test]
    fn valid_chunk_passes() {
        let bytes = b"hello world".to_vec();
        let (root, data_path, hash) = single_leaf_proof(&bytes);
        let chunk = Chunk {
            data_root: root,
            data_size: bytes.len() as u64,
            data_path,
            tx_path: None,
            offset: bytes.len() as u64,
            hash,
            chunk: bytes.clone(),
        };
        let locator = ChunkLocator {
            data_root: root,
            absolute_offset: 0,
            relative_offset: 0,
            tx_size: bytes.len() as u64,
        };
        assert!(validate_chunk(&chunk, &locator).is_ok());
    }

    #[test]
    fn corrupted_bytes_fail_hash_check() {
        let bytes = b"hello world".to_vec();
        let (root, data_path, hash) = single_leaf_proof(&bytes);
        let mut corrupted = bytes.clone();
        corrupted[0] ^= 0xFF;
        let chunk = Chunk {
            data_root: root,
            data_size: bytes.len() as u64,
            data_path,
            tx_path: None,
            offset: bytes.len() as u64,
            hash,
            chunk: corrupted,
        };
        let locator = ChunkLocator {
            data_root: root,
            absolute_offset: 0,
            relative_offset: 0,
            tx_size: bytes.len() as u64,
        };
        assert!(validate_chunk(&chunk, &locator).is_err());
    }

    #[test]
    fn wrong_relative_offset_fails_proof_resolution() {
        let bytes = b"hello world".to_vec();
        let (root, data_path, hash) = single_leaf_proof(&bytes);
        let chunk = Chunk {
            data_root: root,
            data_size: bytes.len() as u64,
            data_path,
            tx_path: None,
            offset: bytes.len() as u64,
            hash,
            chunk: bytes.clone(),
        };
        let locator = ChunkLocator {
            data_root: root,
            absolute_offset: 1000,
            relative_offset: 1000,
            tx_size: bytes.len() as u64,
        };
        assert!(validate_chunk(&chunk, &locator).is_err());
    }
}
