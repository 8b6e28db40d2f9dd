use thiserror::Error;

/// Failure classification for a single chunk-source attempt. Narrower than
/// `GatewayError`; the composite source aggregates these into one message
/// when every candidate is exhausted.
#[derive(Debug, Error)]
pub enum ChunkSourceError {
    #[error("chunk retrieval failed: {0}")]
    Transient(String),
    #[error("chunk failed validation: {0}")]
    Validation(String),
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
#[error("all {attempted} chunk source(s) failed: [{}]", .errors.join("; "))]
pub struct AllSourcesFailed {
    pub attempted: usize,
    pub errors: Vec<String>,
}
