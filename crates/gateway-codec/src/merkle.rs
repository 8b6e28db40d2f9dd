use gateway_core::hash::{sha256, sha256_concat};

use crate::error::CodecError;

/// Size in bytes of one branch record: `left_hash(32) || right_hash(32) ||
/// branch_offset(32, big-endian)`.
const BRANCH_LEN: usize = 96;
/// Size in bytes of the terminal leaf record: `chunk_hash(32) ||
/// end_offset(32, big-endian)`.
const LEAF_LEN: usize = 64;
/// Offset fields are carried as 32-byte big-endian integers on the wire but
/// every real weave offset fits in 64 bits; reject anything wider.
const OFFSET_FIELD_LEN: usize = 32;

/// The chunk boundary a `tx_path`/`data_path` proof resolves to, once
/// validated against a known root hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedBoundary {
    pub chunk_hash: [u8; 32],
    /// Start offset (inclusive), relative to the tree this proof is rooted at.
    pub start_offset: u64,
    /// End offset (exclusive), relative to the same tree.
    pub end_offset: u64,
}

fn read_offset_field(field: &[u8]) -> Result<u64, CodecError> {
    debug_assert_eq!(field.len(), OFFSET_FIELD_LEN);
    if field[..OFFSET_FIELD_LEN - 8].iter().any(|&b| b != 0) {
        return Err(CodecError::InvalidProof(
            "offset field exceeds 64-bit range",
        ));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&field[OFFSET_FIELD_LEN - 8..]);
    Ok(u64::from_be_bytes(buf))
}

/// Walks a Merkle proof from `root` down to its leaf, validating every
/// branch hash along the way, and returns the byte range the leaf covers.
///
/// `root` is the expected hash at the top of `path` (a transaction's
/// `data_root` when validating `tx_path`, or a chunk's leaf-of-leaves root
/// when validating `data_path`). Returns `None` on any hash mismatch or if
/// `target_offset` falls outside the resolved leaf's range; the caller
/// falls back to an index lookup in that case, per the design's "return
/// null signals fallback" rule.
pub fn validate_path(
    root: &[u8; 32],
    path: &[u8],
    target_offset: u64,
) -> Result<Option<ValidatedBoundary>, CodecError> {
    let mut expected = *root;
    let mut left_bound: u64 = 0;
    let mut rest = path;

    loop {
        if rest.len() == LEAF_LEN {
            let chunk_hash: [u8; 32] = rest[0..32].try_into().unwrap();
            let end_offset = read_offset_field(&rest[32..64])?;
            let computed = sha256_concat(&[&sha256(&chunk_hash), &sha256(&rest[32..64])]);
            if computed != expected {
                return Ok(None);
            }
            if target_offset >= left_bound && target_offset < end_offset {
                return Ok(Some(ValidatedBoundary {
                    chunk_hash,
                    start_offset: left_bound,
                    end_offset,
                }));
            }
            return Ok(None);
        }

        if rest.len() < BRANCH_LEN {
            return Err(CodecError::InvalidProof(
                "path ends mid-record: not a multiple of the branch/leaf sizes",
            ));
        }

        let left: [u8; 32] = rest[0..32].try_into().unwrap();
        let right: [u8; 32] = rest[32..64].try_into().unwrap();
        let offset_field = &rest[64..96];
        let branch_offset = read_offset_field(offset_field)?;

        let computed = sha256_concat(&[&sha256(&left), &sha256(&right), &sha256(offset_field)]);
        if computed != expected {
            return Ok(None);
        }

        if target_offset < branch_offset {
            expected = left;
        } else {
            expected = right;
            left_bound = branch_offset;
        }
        rest = &rest[BRANCH_LEN..];
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_path, BRANCH_LEN, LEAF_LEN};
    use gateway_core::hash::{sha256, sha256_concat};

    fn be32(offset: u64) -> [u8; 32] {
        let mut field = [0u8; 32];
        field[24..].copy_from_slice(&offset.to_be_bytes());
        field
    }

    /// Builds a depth-1 proof over two leaves: `[0, split)` and `[split, total)`.
    fn two_leaf_tree(
        left_chunk_hash: [u8; 32],
        split: u64,
        right_chunk_hash: [u8; 32],
        total: u64,
    ) -> ([u8; 32], Vec<u8>, Vec<u8>) {
        let left_offset_field = be32(split);
        let left_leaf_hash = sha256_concat(&[&sha256(&left_chunk_hash), &sha256(&left_offset_field)]);

        let right_offset_field = be32(total);
        let right_leaf_hash =
            sha256_concat(&[&sha256(&right_chunk_hash), &sha256(&right_offset_field)]);

        let branch_offset_field = be32(split);
        let root = sha256_concat(&[
            &sha256(&left_leaf_hash),
            &sha256(&right_leaf_hash),
            &sha256(&branch_offset_field),
        ]);

        let mut left_path = Vec::with_capacity(BRANCH_LEN + LEAF_LEN);
        left_path.extend_from_slice(&left_leaf_hash);
        left_path.extend_from_slice(&right_leaf_hash);
        left_path.extend_from_slice(&branch_offset_field);
        left_path.extend_from_slice(&left_chunk_hash);
        left_path.extend_from_slice(&left_offset_field);

        let mut right_path = Vec::with_capacity(BRANCH_LEN + LEAF_LEN);
        right_path.extend_from_slice(&left_leaf_hash);
        right_path.extend_from_slice(&right_leaf_hash);
        right_path.extend_from_slice(&branch_offset_field);
        right_path.extend_from_slice(&right_chunk_hash);
        right_path.extend_from_slice(&right_offset_field);

        (root, left_path, right_path)
    }

    #[test]
    fn single_leaf_proof_validates_whole_range() {
        let chunk_hash = [7u8; 32];
        let end_offset = be32(100);
        let root = sha256_concat(&[&sha256(&chunk_hash), &sha256(&end_offset)]);
        let mut path = Vec::new();
        path.extend_from_slice(&chunk_hash);
        path.extend_from_slice(&end_offset);

        let boundary = validate_path(&root, &path, 50).unwrap().unwrap();
        assert_eq!(boundary.start_offset, 0);
        assert_eq!(boundary.end_offset, 100);
        assert_eq!(boundary.chunk_hash, chunk_hash);
    }

    #[test]
    fn two_leaf_proof_resolves_correct_leaf_by_target_offset() {
        let left_chunk = [1u8; 32];
        let right_chunk = [2u8; 32];
        let (root, left_path, right_path) = two_leaf_tree(left_chunk, 100, right_chunk, 150);

        let left_boundary = validate_path(&root, &left_path, 50).unwrap().unwrap();
        assert_eq!(left_boundary.start_offset, 0);
        assert_eq!(left_boundary.end_offset, 100);
        assert_eq!(left_boundary.chunk_hash, left_chunk);

        let right_boundary = validate_path(&root, &right_path, 120).unwrap().unwrap();
        assert_eq!(right_boundary.start_offset, 100);
        assert_eq!(right_boundary.end_offset, 150);
        assert_eq!(right_boundary.chunk_hash, right_chunk);
    }

    #[test]
    fn corrupted_leaf_hash_fails_validation() {
        let chunk_hash = [7u8; 32];
        let end_offset = be32(100);
        let root = sha256_concat(&[&sha256(&chunk_hash), &sha256(&end_offset)]);
        let mut path = Vec::new();
        path.extend_from_slice(&[0xFF; 32]);
        path.extend_from_slice(&end_offset);

        assert!(validate_path(&root, &path, 50).unwrap().is_none());
    }

    #[test]
    fn target_offset_outside_leaf_range_is_rejected() {
        let chunk_hash = [7u8; 32];
        let end_offset = be32(100);
        let root = sha256_concat(&[&sha256(&chunk_hash), &sha256(&end_offset)]);
        let mut path = Vec::new();
        path.extend_from_slice(&chunk_hash);
        path.extend_from_slice(&end_offset);

        assert!(validate_path(&root, &path, 150).unwrap().is_none());
    }

    #[test]
    fn truncated_path_is_a_parse_error_not_a_mismatch() {
        let err = validate_path(&[0; 32], &[0u8; 50], 0).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CodecError::InvalidProof(_)
        ));
    }

    #[test]
    fn offset_field_wider_than_64_bits_is_rejected() {
        let mut field = [0u8; 32];
        field[0] = 1;
        let err = super::read_offset_field(&field).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CodecError::InvalidProof(_)
        ));
    }
}
