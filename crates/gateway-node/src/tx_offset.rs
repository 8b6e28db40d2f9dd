use async_trait::async_trait;
use gateway_core::Identifier;
use gateway_sources::chunks::{TxLocation, TxOffsetResolver};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TxOffsetResponse {
    offset: u64,
    size: u64,
    data_root: String,
}

/// Resolves a transaction's weave location from a trusted node's
/// `/tx/{id}/offset` endpoint, decoding its base64url `data_root`.
///
/// `offset` in the response is the transaction's end offset on the weave;
/// the start offset is derived as `offset - size + 1` to match the
/// inclusive end-offset convention used throughout the chunk assembler.
pub struct TrustedNodeOffsetResolver {
    base_url: String,
    http: reqwest::Client,
}

impl TrustedNodeOffsetResolver {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }
}

#[async_trait]
impl TxOffsetResolver for TrustedNodeOffsetResolver {
    async fn resolve(&self, id: &Identifier) -> Option<TxLocation> {
        let url = format!("{}/tx/{}/offset", self.base_url, id.to_wire_string());
        let response = match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), %id, "tx offset lookup failed");
                return None;
            }
            Err(err) => {
                debug!(error = %err, %id, "tx offset request failed");
                return None;
            }
        };
        let body: TxOffsetResponse = response.json().await.ok()?;
        let data_root = gateway_codec::base64url::decode(&body.data_root).ok()?;
        let data_root: [u8; 32] = data_root.try_into().ok()?;
        let start_offset = body.offset.checked_sub(body.size.saturating_sub(1))?;
        Some(TxLocation {
            data_root,
            start_offset,
            size: body.size,
        })
    }
}
