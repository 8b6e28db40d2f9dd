use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::CodecError;

/// Encodes `bytes` as unpadded URL-safe base64, the wire form used
/// throughout the retrieval surface (identifiers, chunk `data_path`/
/// `tx_path`, CDB64 keys presented over HTTP).
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes an unpadded URL-safe base64 string.
pub fn decode(s: &str) -> Result<Vec<u8>, CodecError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| CodecError::Base64(e.to_string()))
}
