use serde::{Deserialize, Serialize};

/// Maximum chunk payload size: 256 KiB.
pub const MAX_CHUNK_SIZE: u64 = 256 * 1024;

/// Maximum accepted chunk POST body size before `PayloadTooLarge`:
/// `256 KiB * 1.4`.
pub const MAX_CHUNK_POST_SIZE: u64 = (MAX_CHUNK_SIZE as f64 * 1.4) as u64;

/// A single validated chunk: an up-to-256-KiB slice of a transaction
/// payload, together with the Merkle path material needed to have
/// validated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub data_root: [u8; 32],
    pub data_size: u64,
    pub data_path: Vec<u8>,
    pub tx_path: Option<Vec<u8>>,
    /// End offset of this chunk's bytes relative to the transaction's
    /// payload start.
    pub offset: u64,
    pub hash: [u8; 32],
    pub chunk: Vec<u8>,
}

impl Chunk {
    /// Relative offset (exclusive start, since `offset` is the end and
    /// `chunk` carries the length) at which this chunk's bytes begin.
    pub fn relative_start(&self) -> u64 {
        self.offset - self.chunk.len() as u64
    }
}

/// Persisted form of a chunk, sufficient to re-request the bytes and
/// re-validate them; does not carry the chunk bytes themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub data_root: [u8; 32],
    pub data_size: u64,
    pub offset: u64,
    pub data_path: Vec<u8>,
    pub hash: [u8; 32],
}

impl From<&Chunk> for ChunkMetadata {
    fn from(chunk: &Chunk) -> Self {
        Self {
            data_root: chunk.data_root,
            data_size: chunk.data_size,
            offset: chunk.offset,
            data_path: chunk.data_path.clone(),
            hash: chunk.hash,
        }
    }
}
