use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::error::GatewayError;
use crate::request_attributes::RequestAttributes;

/// A boxed byte stream yielding chunks of a resolved payload.
///
/// Owned by the caller once returned from a tier: on error, every
/// partially-opened upstream stream backing it must already have been
/// closed or destroyed by the producing tier.
pub type DataStream = Pin<Box<dyn Stream<Item = Result<Bytes, GatewayError>> + Send>>;

/// The result of a successful retrieval from any tier.
pub struct ContiguousData {
    pub stream: DataStream,
    pub size: u64,
    pub source_content_type: Option<String>,
    /// True only if the producing tier cryptographically validated content
    /// against a known data root.
    pub verified: bool,
    /// True when the source is configured as trusted (object store,
    /// configured gateway).
    pub trusted: bool,
    pub cached: bool,
    pub request_attributes: Option<RequestAttributes>,
}

impl ContiguousData {
    /// Builds a `ContiguousData` from an already-in-memory buffer, used by
    /// tiers (cache, S3) that do not need incremental streaming.
    pub fn from_bytes(
        bytes: Bytes,
        source_content_type: Option<String>,
        verified: bool,
        trusted: bool,
        cached: bool,
    ) -> Self {
        let size = bytes.len() as u64;
        let stream: DataStream = Box::pin(futures::stream::once(async move { Ok(bytes) }));
        Self {
            stream,
            size,
            source_content_type,
            verified,
            trusted,
            cached,
            request_attributes: None,
        }
    }
}
