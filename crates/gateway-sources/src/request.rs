use gateway_core::{Identifier, Region, RequestAttributes};

/// What a `ContiguousDataTier` is asked to resolve: an identifier, an
/// optional byte window, and the forwarded per-request attributes used to
/// decide whether this request may still hop to an upstream.
#[derive(Debug, Clone)]
pub struct DataRequest {
    pub id: Identifier,
    pub region: Option<Region>,
    pub request_attributes: RequestAttributes,
}

impl DataRequest {
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            region: None,
            request_attributes: RequestAttributes::default(),
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}
