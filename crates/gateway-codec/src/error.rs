use thiserror::Error;

/// Errors returned by the wire-format parsers in this crate.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("base64url decode error: {0}")]
    Base64(String),
    #[error("malformed merkle proof: {0}")]
    InvalidProof(&'static str),
    #[error("malformed ETF payload: {0}")]
    InvalidEtf(&'static str),
    #[error("malformed CDB64 file: {0}")]
    InvalidCdb(&'static str),
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::Io(err.to_string())
    }
}
