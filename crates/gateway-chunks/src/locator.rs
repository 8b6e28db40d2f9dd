/// Identifies a single chunk to fetch: the transaction's Merkle root, the
/// chunk's position in both the transaction and the global weave, and the
/// transaction's total size (needed by sources that must look the chunk up
/// by index rather than by direct offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocator {
    pub data_root: [u8; 32],
    pub absolute_offset: u64,
    pub relative_offset: u64,
    pub tx_size: u64,
}
