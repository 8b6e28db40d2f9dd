use std::sync::Arc;

use gateway_chunks::CompositeChunkSource;
use gateway_core::{ContiguousData, GatewayError, Identifier, Region, RequestAttributes};
use gateway_peers::PeerManager;
use gateway_ratelimit::{AdmissionGate, Allowlist};
use gateway_sources::chunks::ChunkAssemblyTier;
use gateway_sources::{CacheTier, ChunkMetadataStore, CompositeSource, ContiguousDataTier, DataRequest, S3Tier, TrustedGatewayTier};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{GatewayRuntimeConfig, TierKind};
use crate::manifest::{ManifestResolver, NameResolver};
use crate::metrics::GatewayMetrics;
use crate::payment::PaymentProcessor;
use crate::peer_chunk_source::PeerChunkSource;
use crate::tx_offset::TrustedNodeOffsetResolver;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to construct s3 tier: {0}")]
    S3Setup(String),
}

/// A single fully-resolved retrieval, handed back to the HTTP layer
/// alongside everything it needs to run post-response reconciliation.
pub struct FetchOutcome {
    pub data: ContiguousData,
}

/// Composition root: wires the peer manager, the tier cascade, the
/// admission gate, and the chunk metadata store behind one entry point.
/// Owns the peer-refresh background task.
pub struct GatewayRuntime {
    config: GatewayRuntimeConfig,
    source: CompositeSource,
    peers: Arc<PeerManager>,
    admission: AdmissionGate,
    chunk_metadata: Arc<ChunkMetadataStore>,
    metrics: Arc<GatewayMetrics>,
    payment: Option<Arc<dyn PaymentProcessor>>,
    manifests: Option<Arc<dyn ManifestResolver>>,
    names: Option<Arc<dyn NameResolver>>,
    refresh_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl GatewayRuntime {
    pub async fn new(config: GatewayRuntimeConfig, http: reqwest::Client) -> Result<Self, RuntimeError> {
        let metrics = Arc::new(GatewayMetrics::new());

        let peers = Arc::new(
            PeerManager::new(config.peer_manager_config(), http.clone())
        );

        let chunk_metadata = Arc::new(ChunkMetadataStore::new(config.chunk_metadata_root.clone()));

        let mut tiers: Vec<Box<dyn ContiguousDataTier>> = Vec::new();
        for kind in &config.tiers {
            match kind {
                TierKind::Cache => {
                    tiers.push(Box::new(CacheTier::new(config.cache_root.clone())));
                }
                TierKind::S3 => {
                    if let Some(s3_config) = config.s3_config() {
                        let tier = S3Tier::new(s3_config)
                            .await
                            .map_err(|e| RuntimeError::S3Setup(e.to_string()))?;
                        tiers.push(Box::new(tier));
                    } else {
                        warn!("s3 tier configured but no bucket set; skipping");
                    }
                }
                TierKind::TrustedGateways => {
                    tiers.push(Box::new(TrustedGatewayTier::new(
                        config.trusted_gateway_tier_config(),
                        http.clone(),
                    )));
                }
                TierKind::Chunks => {
                    let chunk_source = Arc::new(CompositeChunkSource::new(
                        vec![Box::new(PeerChunkSource::new(
                            Arc::clone(&peers),
                            http.clone(),
                            config.chunk_source_parallelism,
                        ))],
                        config.chunk_source_parallelism,
                    ));
                    let offsets = Arc::new(TrustedNodeOffsetResolver::new(
                        config.trusted_node_url.clone(),
                        http.clone(),
                    ));
                    tiers.push(Box::new(ChunkAssemblyTier::new(chunk_source, offsets)));
                }
            }
        }

        let allowlist = Allowlist::new(config.ip_allowlist.iter());
        let admission = AdmissionGate::new(config.rate_limiter_config(), allowlist);

        Ok(Self {
            config,
            source: CompositeSource::new(tiers),
            peers,
            admission,
            chunk_metadata,
            metrics,
            payment: None,
            manifests: None,
            names: None,
            refresh_handle: Mutex::new(None),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_payment_processor(mut self, processor: Arc<dyn PaymentProcessor>) -> Self {
        self.payment = Some(processor);
        self
    }

    pub fn with_manifest_resolver(mut self, resolver: Arc<dyn ManifestResolver>) -> Self {
        self.manifests = Some(resolver);
        self
    }

    pub fn with_name_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.names = Some(resolver);
        self
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn peers(&self) -> Arc<PeerManager> {
        Arc::clone(&self.peers)
    }

    pub fn admission(&self) -> &AdmissionGate {
        &self.admission
    }

    pub fn chunk_metadata(&self) -> Arc<ChunkMetadataStore> {
        Arc::clone(&self.chunk_metadata)
    }

    pub fn payment_processor(&self) -> Option<Arc<dyn PaymentProcessor>> {
        self.payment.clone()
    }

    pub fn manifest_resolver(&self) -> Option<Arc<dyn ManifestResolver>> {
        self.manifests.clone()
    }

    pub fn name_resolver(&self) -> Option<Arc<dyn NameResolver>> {
        self.names.clone()
    }

    pub fn max_hops(&self) -> u32 {
        self.config.max_hops
    }

    pub fn payment_capacity_multiplier(&self) -> f64 {
        self.config.payment_capacity_multiplier
    }

    /// Resource names (e.g. resolved ArNS basenames) that bypass rate
    /// limiting and payment admission entirely, per §4.6 step 3.
    pub fn resource_name_allowlist(&self) -> &[String] {
        &self.config.resource_name_allowlist
    }

    /// Resolves a request, enforcing the hop limit before the cascade is
    /// even attempted: a request already at `max_hops` is rejected without
    /// trying any tier, matching the forwarding-eligibility rule.
    pub async fn fetch(
        &self,
        id: Identifier,
        region: Option<Region>,
        request_attributes: RequestAttributes,
        cancel: CancellationToken,
    ) -> Result<FetchOutcome, GatewayError> {
        if !request_attributes.may_forward(self.config.max_hops) {
            return Err(GatewayError::Unsatisfiable(
                "request has exhausted its hop budget".to_string(),
            ));
        }

        let mut req = DataRequest::new(id);
        req.request_attributes = request_attributes;
        if let Some(region) = region {
            req = req.with_region(region);
        }

        match self.source.fetch(&req, cancel).await {
            Ok(data) => {
                self.metrics.record_tier_success();
                Ok(FetchOutcome { data })
            }
            Err(err) => {
                self.metrics.record_tier_failure();
                if matches!(err, GatewayError::NotFound | GatewayError::UpstreamTransient(_)) {
                    self.metrics.record_all_tiers_failed();
                }
                Err(err)
            }
        }
    }

    /// Starts the periodic peer-refresh task. Idempotent: a second call
    /// while one is already running is a no-op.
    pub async fn spawn_peer_refresh(self: &Arc<Self>) {
        let mut handle_slot = self.refresh_handle.lock().await;
        if handle_slot.is_some() {
            return;
        }

        let runtime = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let interval = self.config.peer_refresh_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("peer refresh task shutting down");
                        return;
                    }
                    _ = ticker.tick() => {
                        match runtime.peers.refresh().await {
                            Ok(()) => {
                                runtime.metrics.record_peer_refresh_ok();
                                if let Err(err) = runtime.peers.refresh_sync_buckets().await {
                                    warn!(error = %err, "sync-bucket refresh failed");
                                }
                            }
                            Err(err) => {
                                runtime.metrics.record_peer_refresh_failed();
                                warn!(error = %err, "peer refresh failed");
                            }
                        }
                    }
                }
            }
        });

        *handle_slot = Some(handle);
    }

    /// Signals the peer-refresh task to stop and waits for it to exit.
    /// Part of the graceful-shutdown sequence run by `apps/gateway-server`.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.refresh_handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_id() -> Identifier {
        "A".repeat(43).parse().unwrap()
    }

    async fn bare_runtime(tiers: Vec<TierKind>) -> GatewayRuntime {
        let config = GatewayRuntimeConfig {
            tiers,
            max_hops: 3,
            ..Default::default()
        };
        GatewayRuntime::new(config, reqwest::Client::new()).await.unwrap()
    }

    #[tokio::test]
    async fn a_request_at_the_hop_limit_is_rejected_before_any_tier_runs() {
        let runtime = bare_runtime(vec![]).await;
        let attrs = RequestAttributes {
            hops: 3,
            ..Default::default()
        };
        let err = runtime
            .fetch(sample_id(), None, attrs, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unsatisfiable(_)));
    }

    #[tokio::test]
    async fn an_empty_cascade_reports_not_found_and_records_failure_metrics() {
        let runtime = bare_runtime(vec![]).await;
        let err = runtime
            .fetch(sample_id(), None, RequestAttributes::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound));
        assert_eq!(
            runtime
                .metrics()
                .tier_failure
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }
}
