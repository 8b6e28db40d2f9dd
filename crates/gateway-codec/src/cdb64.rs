use crate::error::CodecError;

const HEADER_LEN: usize = 4096;
const NUM_TABLES: usize = 256;

fn djb64(key: &[u8]) -> u64 {
    let mut h: u64 = 5381;
    for &b in key {
        h = h.wrapping_shl(5).wrapping_add(h) ^ (b as u64);
    }
    h
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(bytes.try_into().unwrap())
}

/// Builds a CDB64 file image in memory from an ordered list of key/value
/// pairs; the caller persists the returned bytes (atomically, via
/// temp-file-then-rename) to disk.
#[derive(Default)]
pub struct Cdb64Builder {
    records: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Cdb64Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.records.push((key, value));
    }

    pub fn build(self) -> Vec<u8> {
        let mut records_section = Vec::new();
        let mut record_positions = Vec::with_capacity(self.records.len());
        for (key, value) in &self.records {
            let pos = HEADER_LEN + records_section.len();
            records_section.extend_from_slice(&(key.len() as u64).to_le_bytes());
            records_section.extend_from_slice(&(value.len() as u64).to_le_bytes());
            records_section.extend_from_slice(key);
            records_section.extend_from_slice(value);
            record_positions.push(pos as u64);
        }

        let mut buckets: Vec<Vec<(u64, u64)>> = vec![Vec::new(); NUM_TABLES];
        for ((key, _), &pos) in self.records.iter().zip(record_positions.iter()) {
            let hash = djb64(key);
            buckets[(hash % NUM_TABLES as u64) as usize].push((hash, pos));
        }

        let mut header = vec![0u8; HEADER_LEN];
        let mut tables_section = Vec::new();
        let mut table_cursor = HEADER_LEN + records_section.len();

        for (idx, entries) in buckets.iter().enumerate() {
            let table_len = entries.len() * 2;
            if table_len == 0 {
                continue;
            }
            let mut slots = vec![(0u64, 0u64); table_len];
            for &(hash, pos) in entries {
                let mut slot = ((hash / NUM_TABLES as u64) % table_len as u64) as usize;
                while slots[slot].1 != 0 {
                    slot = (slot + 1) % table_len;
                }
                slots[slot] = (hash, pos);
            }

            let header_offset = idx * 16;
            header[header_offset..header_offset + 8]
                .copy_from_slice(&(table_cursor as u64).to_le_bytes());
            header[header_offset + 8..header_offset + 16]
                .copy_from_slice(&(table_len as u64).to_le_bytes());

            for (hash, pos) in slots {
                tables_section.extend_from_slice(&hash.to_le_bytes());
                tables_section.extend_from_slice(&pos.to_le_bytes());
            }
            table_cursor += table_len * 16;
        }

        let mut out = Vec::with_capacity(HEADER_LEN + records_section.len() + tables_section.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&records_section);
        out.extend_from_slice(&tables_section);
        out
    }
}

/// Looks up `key` in a CDB64 file image already read into memory.
pub fn lookup<'a>(data: &'a [u8], key: &[u8]) -> Result<Option<&'a [u8]>, CodecError> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::InvalidCdb("file shorter than the fixed header"));
    }
    let hash = djb64(key);
    let table_idx = (hash % NUM_TABLES as u64) as usize;
    let header_offset = table_idx * 16;
    let table_pos = read_u64_le(&data[header_offset..header_offset + 8]) as usize;
    let table_len = read_u64_le(&data[header_offset + 8..header_offset + 16]) as usize;
    if table_len == 0 {
        return Ok(None);
    }

    let start_slot = ((hash / NUM_TABLES as u64) % table_len as u64) as usize;
    for i in 0..table_len {
        let slot = (start_slot + i) % table_len;
        let slot_offset = table_pos + slot * 16;
        if slot_offset + 16 > data.len() {
            return Err(CodecError::InvalidCdb("hash table slot out of bounds"));
        }
        let slot_hash = read_u64_le(&data[slot_offset..slot_offset + 8]);
        let slot_pos = read_u64_le(&data[slot_offset + 8..slot_offset + 16]) as usize;
        if slot_pos == 0 {
            return Ok(None);
        }
        if slot_hash != hash {
            continue;
        }
        if slot_pos + 16 > data.len() {
            return Err(CodecError::InvalidCdb("record header out of bounds"));
        }
        let key_len = read_u64_le(&data[slot_pos..slot_pos + 8]) as usize;
        let value_len = read_u64_le(&data[slot_pos + 8..slot_pos + 16]) as usize;
        let key_start = slot_pos + 16;
        let value_start = key_start + key_len;
        if value_start + value_len > data.len() {
            return Err(CodecError::InvalidCdb("record body out of bounds"));
        }
        if &data[key_start..value_start] == key {
            return Ok(Some(&data[value_start..value_start + value_len]));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::{lookup, Cdb64Builder};
    use gateway_core::hash::sha256;

    #[test]
    fn every_inserted_key_looks_up_to_its_value() {
        let mut builder = Cdb64Builder::new();
        let mut keys = Vec::new();
        for i in 0u32..10_000 {
            let key = sha256(&i.to_be_bytes()).to_vec();
            let value = format!("v{i}").into_bytes();
            builder.insert(key.clone(), value);
            keys.push(key);
        }
        let image = builder.build();

        for (i, key) in keys.iter().enumerate() {
            let value = lookup(&image, key).unwrap().unwrap();
            assert_eq!(value, format!("v{i}").as_bytes());
        }
    }

    #[test]
    fn unknown_key_returns_not_found() {
        let mut builder = Cdb64Builder::new();
        builder.insert(b"k1".to_vec(), b"v1".to_vec());
        let image = builder.build();
        assert!(lookup(&image, b"does-not-exist").unwrap().is_none());
    }

    #[test]
    fn empty_builder_yields_a_valid_header_only_file() {
        let image = Cdb64Builder::new().build();
        assert_eq!(image.len(), 4096);
        assert!(lookup(&image, b"anything").unwrap().is_none());
    }

    #[test]
    fn truncated_file_is_rejected() {
        assert!(lookup(&[0u8; 10], b"k").is_err());
    }
}
