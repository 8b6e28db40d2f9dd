use std::collections::BTreeSet;

use crate::error::CodecError;

const ETF_VERSION: u8 = 131;
const SMALL_TUPLE_EXT: u8 = 104;
const LARGE_TUPLE_EXT: u8 = 105;
const SMALL_INTEGER_EXT: u8 = 97;
const INTEGER_EXT: u8 = 98;
const NEW_FLOAT_EXT: u8 = 70;
const SMALL_BIG_EXT: u8 = 110;
const MAP_EXT: u8 = 116;

/// A peer's declared holdings, parsed from its `/sync_buckets` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncBuckets {
    pub bucket_size: u64,
    pub buckets: BTreeSet<u32>,
}

enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn is_positive(&self) -> bool {
        match self {
            Number::Int(v) => *v > 0,
            Number::Float(v) => *v > 0.0,
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() - self.pos < n {
            return Err(CodecError::InvalidEtf("unexpected end of input"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u32_be(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    /// Reads one integer-valued term, as either a bucket-size or a map key.
    fn integer_term(&mut self) -> Result<i64, CodecError> {
        match self.byte()? {
            SMALL_INTEGER_EXT => Ok(self.byte()? as i64),
            INTEGER_EXT => {
                let bytes = self.take(4)?;
                Ok(i32::from_be_bytes(bytes.try_into().unwrap()) as i64)
            }
            SMALL_BIG_EXT => {
                let len = self.byte()? as usize;
                let sign = self.byte()?;
                let digits = self.take(len)?;
                let mut value: i64 = 0;
                for &digit in digits.iter().rev() {
                    value = value
                        .checked_mul(256)
                        .and_then(|v| v.checked_add(digit as i64))
                        .ok_or(CodecError::InvalidEtf("SMALL_BIG_EXT overflows i64"))?;
                }
                Ok(if sign == 0 { value } else { -value })
            }
            tag => Err(match tag {
                t if t == NEW_FLOAT_EXT || t == MAP_EXT => {
                    CodecError::InvalidEtf("expected an integer term, found a different tag")
                }
                _ => CodecError::InvalidEtf("unsupported ETF tag for an integer term"),
            }),
        }
    }

    /// Reads one numeric term whose value we only need the sign of.
    fn value_term(&mut self) -> Result<Number, CodecError> {
        match self.byte()? {
            SMALL_INTEGER_EXT => Ok(Number::Int(self.byte()? as i64)),
            INTEGER_EXT => {
                let bytes = self.take(4)?;
                Ok(Number::Int(i32::from_be_bytes(bytes.try_into().unwrap()) as i64))
            }
            SMALL_BIG_EXT => {
                let len = self.byte()? as usize;
                let sign = self.byte()?;
                let digits = self.take(len)?;
                let any_nonzero = digits.iter().any(|&b| b != 0);
                Ok(Number::Int(if !any_nonzero {
                    0
                } else if sign == 0 {
                    1
                } else {
                    -1
                }))
            }
            NEW_FLOAT_EXT => {
                let bytes = self.take(8)?;
                Ok(Number::Float(f64::from_be_bytes(bytes.try_into().unwrap())))
            }
            _ => Err(CodecError::InvalidEtf("unsupported ETF tag for a value term")),
        }
    }

    fn map_term(&mut self) -> Result<BTreeSet<u32>, CodecError> {
        let tag = self.byte()?;
        if tag != MAP_EXT {
            return Err(CodecError::InvalidEtf("expected a map term"));
        }
        let arity = self.u32_be()?;
        let mut buckets = BTreeSet::new();
        for _ in 0..arity {
            let key = self.integer_term()?;
            let value = self.value_term()?;
            if value.is_positive() {
                let bucket: u32 = u32::try_from(key)
                    .map_err(|_| CodecError::InvalidEtf("bucket index out of u32 range"))?;
                buckets.insert(bucket);
            }
        }
        Ok(buckets)
    }
}

/// Parses the `131`-prefixed `{BucketSize, Map}` 2-tuple a peer's
/// `/sync_buckets` endpoint returns, keeping only bucket indices whose
/// declared share is greater than zero.
pub fn parse_sync_buckets(bytes: &[u8]) -> Result<SyncBuckets, CodecError> {
    let mut reader = Reader::new(bytes);
    if reader.byte()? != ETF_VERSION {
        return Err(CodecError::InvalidEtf("missing ETF version byte (131)"));
    }
    let arity = match reader.byte()? {
        SMALL_TUPLE_EXT => reader.byte()? as u32,
        LARGE_TUPLE_EXT => reader.u32_be()?,
        _ => return Err(CodecError::InvalidEtf("expected a 2-tuple at top level")),
    };
    if arity != 2 {
        return Err(CodecError::InvalidEtf("top-level tuple must have arity 2"));
    }
    let bucket_size = reader.integer_term()?;
    let bucket_size: u64 = u64::try_from(bucket_size)
        .map_err(|_| CodecError::InvalidEtf("BucketSize must be a positive integer"))?;
    if bucket_size == 0 {
        return Err(CodecError::InvalidEtf("BucketSize must be a positive integer"));
    }
    let buckets = reader.map_term()?;
    Ok(SyncBuckets {
        bucket_size,
        buckets,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_sync_buckets;

    fn small_int(v: u8) -> Vec<u8> {
        vec![97, v]
    }

    fn small_float_bytes() -> Vec<u8> {
        float_bytes(0.5)
    }

    fn float_bytes(value: f64) -> Vec<u8> {
        let mut v = vec![70];
        v.extend_from_slice(&value.to_be_bytes());
        v
    }

    fn encode_map(entries: &[(u8, Vec<u8>)]) -> Vec<u8> {
        let mut out = vec![116];
        out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
        for (key, value) in entries {
            out.extend_from_slice(&small_int(*key));
            out.extend_from_slice(value);
        }
        out
    }

    fn wrap(bucket_size: u8, map: Vec<u8>) -> Vec<u8> {
        let mut out = vec![131, 104, 2];
        out.extend_from_slice(&small_int(bucket_size));
        out.extend_from_slice(&map);
        out
    }

    #[test]
    fn parses_bucket_size_and_positive_entries_only() {
        let map = encode_map(&[
            (1, small_int(50)),
            (2, small_int(0)),
            (3, small_float_bytes()),
        ]);
        let bytes = wrap(10, map);
        let parsed = parse_sync_buckets(&bytes).unwrap();
        assert_eq!(parsed.bucket_size, 10);
        assert_eq!(
            parsed.buckets,
            [1u32, 3].into_iter().collect::<std::collections::BTreeSet<_>>()
        );
    }

    #[test]
    fn negative_and_zero_float_entries_are_excluded() {
        let map = encode_map(&[
            (1, float_bytes(0.25)),
            (2, float_bytes(-0.1)),
            (3, float_bytes(0.0)),
        ]);
        let bytes = wrap(10, map);
        let parsed = parse_sync_buckets(&bytes).unwrap();
        assert_eq!(
            parsed.buckets,
            [1u32].into_iter().collect::<std::collections::BTreeSet<_>>()
        );
    }

    #[test]
    fn rejects_missing_version_byte() {
        let bytes = vec![104, 2];
        assert!(parse_sync_buckets(&bytes).is_err());
    }

    #[test]
    fn rejects_zero_bucket_size() {
        let map = encode_map(&[(1, small_int(1))]);
        let bytes = wrap(0, map);
        assert!(parse_sync_buckets(&bytes).is_err());
    }

    #[test]
    fn empty_map_yields_empty_bucket_set() {
        let bytes = wrap(5, encode_map(&[]));
        let parsed = parse_sync_buckets(&bytes).unwrap();
        assert!(parsed.buckets.is_empty());
    }
}
