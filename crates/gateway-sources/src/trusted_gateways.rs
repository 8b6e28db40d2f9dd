use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use gateway_core::ContiguousData;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TierError;
use crate::request::DataRequest;
use crate::tier::ContiguousDataTier;

const INITIAL_WEIGHT: i32 = 50;
const MIN_WEIGHT: i32 = 1;
const MAX_WEIGHT: i32 = 100;

#[derive(Debug, Clone)]
pub struct TrustedGatewayTierConfig {
    /// Priority-ordered groups of candidate gateway base URLs. Groups are
    /// tried in order; within a group, candidate order is randomized per
    /// request.
    pub tiers: Vec<Vec<String>>,
    /// Per-candidate request timeout; combined with the caller's
    /// cancellation signal as "whichever fires first".
    pub request_timeout: Duration,
}

impl Default for TrustedGatewayTierConfig {
    fn default() -> Self {
        Self {
            tiers: Vec::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

enum CandidateOutcome {
    Disconnect,
    Failed(String),
}

/// The most elaborate retrieval tier: streams `/raw/{id}` directly from a
/// configured, priority-tiered set of peer gateways, without buffering.
pub struct TrustedGatewayTier {
    config: TrustedGatewayTierConfig,
    http: reqwest::Client,
    weights: RwLock<HashMap<String, i32>>,
}

impl TrustedGatewayTier {
    pub fn new(config: TrustedGatewayTierConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            weights: RwLock::new(HashMap::new()),
        }
    }

    async fn report_success(&self, candidate: &str) {
        let mut weights = self.weights.write().await;
        let weight = weights.entry(candidate.to_string()).or_insert(INITIAL_WEIGHT);
        *weight = (*weight + 1).min(MAX_WEIGHT);
    }

    async fn report_failure(&self, candidate: &str) {
        let mut weights = self.weights.write().await;
        let weight = weights.entry(candidate.to_string()).or_insert(INITIAL_WEIGHT);
        *weight = (*weight - 1).max(MIN_WEIGHT);
    }

    async fn try_candidate(
        &self,
        base_url: &str,
        req: &DataRequest,
        cancel: CancellationToken,
    ) -> Result<ContiguousData, CandidateOutcome> {
        let url = format!(
            "{}/raw/{}",
            base_url.trim_end_matches('/'),
            req.id.to_wire_string()
        );
        let mut builder = self.http.get(&url).header("Accept-Encoding", "identity");
        if let Some(region) = req.region {
            builder = builder.header(
                "Range",
                format!("bytes={}-{}", region.offset, region.end_inclusive()),
            );
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CandidateOutcome::Disconnect),
            result = tokio::time::timeout(self.config.request_timeout, builder.send()) => {
                match result {
                    Err(_) => return Err(CandidateOutcome::Failed("request timed out".to_string())),
                    Ok(Err(e)) => return Err(CandidateOutcome::Failed(e.to_string())),
                    Ok(Ok(response)) => response,
                }
            }
        };

        let status = response.status();
        let expected = if req.region.is_some() { 206 } else { 200 };
        if status.as_u16() != expected && !(req.region.is_some() && status.as_u16() == 200) {
            return Err(CandidateOutcome::Failed(format!(
                "unexpected status {status}"
            )));
        }

        let size = match req.region {
            Some(region) => region.size,
            None => response
                .content_length()
                .unwrap_or(0),
        };
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| gateway_core::GatewayError::UpstreamTransient(e.to_string()))
        });

        Ok(ContiguousData {
            stream: Box::pin(body),
            size,
            source_content_type: content_type,
            verified: false,
            trusted: true,
            cached: false,
            request_attributes: None,
        })
    }
}

#[async_trait]
impl ContiguousDataTier for TrustedGatewayTier {
    async fn fetch(
        &self,
        req: &DataRequest,
        cancel: CancellationToken,
    ) -> Result<ContiguousData, TierError> {
        for group in &self.config.tiers {
            let mut candidates = group.clone();
            candidates.shuffle(&mut rand::thread_rng());

            for candidate in candidates {
                if cancel.is_cancelled() {
                    return Err(TierError::ClientDisconnect {
                        tier: self.name().to_string(),
                    });
                }

                match self.try_candidate(&candidate, req, cancel.child_token()).await {
                    Ok(data) => {
                        debug!(gateway = %candidate, id = %req.id, "trusted gateway served request");
                        self.report_success(&candidate).await;
                        return Ok(data);
                    }
                    Err(CandidateOutcome::Disconnect) => {
                        return Err(TierError::ClientDisconnect {
                            tier: self.name().to_string(),
                        });
                    }
                    Err(CandidateOutcome::Failed(message)) => {
                        warn!(gateway = %candidate, id = %req.id, error = %message, "trusted gateway candidate failed");
                        self.report_failure(&candidate).await;
                        continue;
                    }
                }
            }
        }

        Err(TierError::NotFound {
            tier: self.name().to_string(),
        })
    }

    fn name(&self) -> &str {
        "trusted-gateways"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn report_success_and_failure_clamp_within_bounds() {
        let tier = TrustedGatewayTier::new(TrustedGatewayTierConfig::default(), reqwest::Client::new());
        for _ in 0..200 {
            tier.report_success("g1").await;
        }
        assert_eq!(*tier.weights.read().await.get("g1").unwrap(), MAX_WEIGHT);

        for _ in 0..200 {
            tier.report_failure("g2").await;
        }
        assert_eq!(*tier.weights.read().await.get("g2").unwrap(), MIN_WEIGHT);
    }

    #[tokio::test]
    async fn no_configured_tiers_is_not_found() {
        let tier = TrustedGatewayTier::new(TrustedGatewayTierConfig::default(), reqwest::Client::new());
        let req = DataRequest::new("A".repeat(43).parse().unwrap());
        let err = tier.fetch(&req, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TierError::NotFound { .. }));
    }

    #[tokio::test]
    async fn already_cancelled_token_is_client_disconnect() {
        let tier = TrustedGatewayTier::new(
            TrustedGatewayTierConfig {
                tiers: vec![vec!["http://example.invalid".to_string()]],
                request_timeout: Duration::from_millis(50),
            },
            reqwest::Client::new(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let req = DataRequest::new("A".repeat(43).parse().unwrap());
        let err = tier.fetch(&req, cancel).await.unwrap_err();
        assert!(matches!(err, TierError::ClientDisconnect { .. }));
    }
}
