//! Wire-format codecs for the gateway: base64url, the CDB64 on-disk index,
//! the Merkle `tx_path`/`data_path` proof format, the sync-bucket ETF
//! subset, and HTTP `Range`/multipart-byteranges handling.

pub mod base64url;
pub mod cdb64;
pub mod error;
pub mod etf;
pub mod merkle;
pub mod range;

pub use error::CodecError;
pub use merkle::ValidatedBoundary;
pub use range::ParsedRange;
