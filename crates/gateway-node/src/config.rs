use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gateway_peers::PeerManagerConfig;
use gateway_ratelimit::RateLimiterConfig;
use gateway_sources::trusted_gateways::TrustedGatewayTierConfig;
use gateway_sources::S3Config;

/// Which retrieval tiers are wired into the composite source, and in what
/// order. A tier absent from this list is never consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierKind {
    Cache,
    S3,
    TrustedGateways,
    Chunks,
}

/// Top-level configuration for a [`crate::runtime::GatewayRuntime`],
/// assembled by `apps/gateway-server`'s layered config loader (defaults +
/// TOML file + environment).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayRuntimeConfig {
    pub tiers: Vec<TierKind>,
    pub cache_root: PathBuf,
    pub chunk_metadata_root: PathBuf,
    pub chunk_source_parallelism: usize,
    pub max_hops: u32,
    pub trusted_node_url: String,
    pub peer_ignore_hosts: Vec<String>,
    pub preferred_get_chunk_peers: Vec<String>,
    pub preferred_post_chunk_peers: Vec<String>,
    pub peer_info_fetch_concurrency: usize,
    #[serde(with = "humantime_serde")]
    pub peer_refresh_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub peer_info_timeout: Duration,
    pub rate_limit_capacity: f64,
    pub rate_limit_refill_per_sec: f64,
    pub rate_limit_max_buckets: NonZeroUsize,
    pub payment_capacity_multiplier: f64,
    pub ip_allowlist: Vec<String>,
    pub resource_name_allowlist: Vec<String>,
    pub trusted_gateway_tiers: Vec<Vec<String>>,
    #[serde(with = "humantime_serde")]
    pub trusted_gateway_timeout: Duration,
    /// Present only when the `s3` tier is enabled; `s3_bucket` doubles as
    /// the switch since an empty bucket name can never be valid.
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,
    pub s3_endpoint_url: Option<String>,
    pub s3_key_prefix: String,
}

impl Default for GatewayRuntimeConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierKind::Cache,
                TierKind::S3,
                TierKind::TrustedGateways,
                TierKind::Chunks,
            ],
            cache_root: PathBuf::from("data/cache"),
            chunk_metadata_root: PathBuf::from("data/chunk-metadata"),
            chunk_source_parallelism: 1,
            max_hops: 3,
            trusted_node_url: String::new(),
            peer_ignore_hosts: Vec::new(),
            preferred_get_chunk_peers: Vec::new(),
            preferred_post_chunk_peers: Vec::new(),
            peer_info_fetch_concurrency: 16,
            peer_refresh_interval: Duration::from_secs(60),
            peer_info_timeout: Duration::from_secs(1),
            rate_limit_capacity: 100.0,
            rate_limit_refill_per_sec: 10.0,
            rate_limit_max_buckets: NonZeroUsize::new(100_000).unwrap(),
            payment_capacity_multiplier: 2.0,
            ip_allowlist: Vec::new(),
            resource_name_allowlist: Vec::new(),
            trusted_gateway_tiers: Vec::new(),
            trusted_gateway_timeout: Duration::from_secs(10),
            s3_bucket: None,
            s3_region: String::new(),
            s3_access_key_id: String::new(),
            s3_secret_access_key: String::new(),
            s3_endpoint_url: None,
            s3_key_prefix: String::new(),
        }
    }
}

impl GatewayRuntimeConfig {
    pub fn trusted_gateway_tier_config(&self) -> TrustedGatewayTierConfig {
        TrustedGatewayTierConfig {
            tiers: self.trusted_gateway_tiers.clone(),
            request_timeout: self.trusted_gateway_timeout,
        }
    }

    pub fn s3_config(&self) -> Option<S3Config> {
        let bucket = self.s3_bucket.clone()?;
        Some(S3Config {
            bucket,
            region: self.s3_region.clone(),
            access_key_id: self.s3_access_key_id.clone(),
            secret_access_key: self.s3_secret_access_key.clone(),
            endpoint_url: self.s3_endpoint_url.clone(),
            key_prefix: self.s3_key_prefix.clone(),
        })
    }

    pub fn peer_manager_config(&self) -> PeerManagerConfig {
        PeerManagerConfig {
            trusted_node_url: self.trusted_node_url.clone(),
            ignore_hosts: self.peer_ignore_hosts.iter().cloned().collect(),
            preferred_get_chunk: self.preferred_get_chunk_peers.clone(),
            preferred_post_chunk: self.preferred_post_chunk_peers.clone(),
            refresh_interval: self.peer_refresh_interval,
            info_timeout: self.peer_info_timeout,
            info_fetch_concurrency: self.peer_info_fetch_concurrency,
        }
    }

    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            capacity: self.rate_limit_capacity,
            refill_rate: self.rate_limit_refill_per_sec,
            max_buckets: self.rate_limit_max_buckets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tier_order_matches_the_cascade_in_spec() {
        let config = GatewayRuntimeConfig::default();
        assert!(matches!(config.tiers[0], TierKind::Cache));
        assert!(matches!(config.tiers[3], TierKind::Chunks));
    }

    #[test]
    fn serializes_round_trip_through_toml() {
        let config = GatewayRuntimeConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let back: GatewayRuntimeConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(back.max_hops, config.max_hops);
        assert_eq!(back.rate_limit_capacity, config.rate_limit_capacity);
    }
}
