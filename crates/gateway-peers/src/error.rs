use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("fetching /peers from trusted node failed: {0}")]
    PeerListUnavailable(String),
    #[error("peer {peer} /info request failed: {source}")]
    InfoUnavailable { peer: String, source: String },
    #[error("peer {peer} /sync_buckets request failed: {source}")]
    SyncBucketsUnavailable { peer: String, source: String },
}
