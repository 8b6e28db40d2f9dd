use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of `bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Computes SHA-256 over the concatenation of `parts`, without allocating an
/// intermediate buffer.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::{sha256, sha256_concat};

    #[test]
    fn sha256_matches_known_vector() {
        let digest = sha256(b"abc");
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_concat_matches_single_call_on_joined_bytes() {
        let a = b"hello ";
        let b = b"world";
        let joined = [a.as_slice(), b.as_slice()].concat();
        assert_eq!(sha256_concat(&[a, b]), sha256(&joined));
    }
}
