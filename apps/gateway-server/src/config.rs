use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use gateway_node::{GatewayRuntimeConfig, TierKind};
use gateway_ratelimit::RateLimiterConfig;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// Flat, layered configuration for the bound `gateway-server` binary:
/// defaults, then an optional TOML file, then `GATEWAY_*` environment
/// variables, in that precedence order.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_level: String,
    pub log_buffer_size: usize,
    pub admin_token: Option<String>,

    pub tiers: Vec<TierKind>,
    pub cache_root: PathBuf,
    pub chunk_metadata_root: PathBuf,
    pub chunk_source_parallelism: usize,
    pub max_hops: u32,

    pub trusted_node_url: String,
    #[serde(deserialize_with = "deserialize_list")]
    pub peer_ignore_hosts: Vec<String>,
    #[serde(deserialize_with = "deserialize_list")]
    pub preferred_get_chunk_peers: Vec<String>,
    #[serde(deserialize_with = "deserialize_list")]
    pub preferred_post_chunk_peers: Vec<String>,
    pub peer_info_fetch_concurrency: usize,
    #[serde(with = "humantime_serde")]
    pub peer_refresh_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub peer_info_timeout: Duration,

    pub rate_limit_capacity: f64,
    pub rate_limit_refill_per_sec: f64,
    pub rate_limit_max_buckets: usize,
    pub payment_capacity_multiplier: f64,
    #[serde(deserialize_with = "deserialize_list")]
    pub ip_allowlist: Vec<String>,
    #[serde(deserialize_with = "deserialize_list")]
    pub resource_name_allowlist: Vec<String>,

    #[serde(default)]
    pub trusted_gateway_tiers: Vec<Vec<String>>,
    #[serde(with = "humantime_serde")]
    pub trusted_gateway_timeout: Duration,

    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,
    pub s3_endpoint_url: Option<String>,
    pub s3_key_prefix: String,
}

/// Accepts either a single delimited string (`"a,b,c"` or `"a;b;c"`) or a
/// native TOML array, matching the teacher's list-field convention so a
/// comma-separated environment variable overrides a file-provided array.
fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ListVisitor;

    impl<'de> Visitor<'de> for ListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a sequence of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value
                .split(|c| c == ',' || c == ';')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect())
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: de::SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(element) = seq.next_element()? {
                vec.push(element);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(ListVisitor)
}

impl ServerConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("listen_addr", "0.0.0.0:8080")?
            .set_default("log_level", "info")?
            .set_default("log_buffer_size", 500)?
            .set_default("admin_token", None::<String>)?
            .set_default(
                "tiers",
                vec!["cache", "s3", "trusted-gateways", "chunks"],
            )?
            .set_default("cache_root", "data/cache")?
            .set_default("chunk_metadata_root", "data/chunk-metadata")?
            .set_default("chunk_source_parallelism", 1)?
            .set_default("max_hops", 3)?
            .set_default("trusted_node_url", "")?
            .set_default("peer_ignore_hosts", Vec::<String>::new())?
            .set_default("preferred_get_chunk_peers", Vec::<String>::new())?
            .set_default("preferred_post_chunk_peers", Vec::<String>::new())?
            .set_default("peer_info_fetch_concurrency", 16)?
            .set_default("peer_refresh_interval", "60s")?
            .set_default("peer_info_timeout", "1s")?
            .set_default("rate_limit_capacity", 100.0)?
            .set_default("rate_limit_refill_per_sec", 10.0)?
            .set_default("rate_limit_max_buckets", 100_000)?
            .set_default("payment_capacity_multiplier", 2.0)?
            .set_default("ip_allowlist", Vec::<String>::new())?
            .set_default("resource_name_allowlist", Vec::<String>::new())?
            .set_default("trusted_gateway_timeout", "10s")?
            .set_default("s3_bucket", None::<String>)?
            .set_default("s3_region", "")?
            .set_default("s3_access_key_id", "")?
            .set_default("s3_secret_access_key", "")?
            .set_default("s3_endpoint_url", None::<String>)?
            .set_default("s3_key_prefix", "")?;

        if let Some(path) = config_path {
            if path.extension().and_then(|ext| ext.to_str()) == Some("env") {
                match dotenvy::from_path(&path) {
                    Ok(()) => tracing::info!("loaded environment from {}", path.display()),
                    Err(err) => tracing::warn!("failed to load .env from {}: {}", path.display(), err),
                }
            } else {
                builder = builder.add_source(File::from(path));
            }
        }

        builder = builder.add_source(Environment::with_prefix("GATEWAY").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    pub fn runtime_config(&self) -> GatewayRuntimeConfig {
        GatewayRuntimeConfig {
            tiers: self.tiers.clone(),
            cache_root: self.cache_root.clone(),
            chunk_metadata_root: self.chunk_metadata_root.clone(),
            chunk_source_parallelism: self.chunk_source_parallelism,
            max_hops: self.max_hops,
            trusted_node_url: self.trusted_node_url.clone(),
            peer_ignore_hosts: self.peer_ignore_hosts.clone(),
            preferred_get_chunk_peers: self.preferred_get_chunk_peers.clone(),
            preferred_post_chunk_peers: self.preferred_post_chunk_peers.clone(),
            peer_info_fetch_concurrency: self.peer_info_fetch_concurrency,
            peer_refresh_interval: self.peer_refresh_interval,
            peer_info_timeout: self.peer_info_timeout,
            rate_limit_capacity: self.rate_limit_capacity,
            rate_limit_refill_per_sec: self.rate_limit_refill_per_sec,
            rate_limit_max_buckets: NonZeroUsize::new(self.rate_limit_max_buckets.max(1)).unwrap(),
            payment_capacity_multiplier: self.payment_capacity_multiplier,
            ip_allowlist: self.ip_allowlist.clone(),
            resource_name_allowlist: self.resource_name_allowlist.clone(),
            trusted_gateway_tiers: self.trusted_gateway_tiers.clone(),
            trusted_gateway_timeout: self.trusted_gateway_timeout,
            s3_bucket: self.s3_bucket.clone(),
            s3_region: self.s3_region.clone(),
            s3_access_key_id: self.s3_access_key_id.clone(),
            s3_secret_access_key: self.s3_secret_access_key.clone(),
            s3_endpoint_url: self.s3_endpoint_url.clone(),
            s3_key_prefix: self.s3_key_prefix.clone(),
        }
    }

    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        self.runtime_config().rate_limiter_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn with_env<F>(vars: &[(&str, &str)], test: F)
    where
        F: FnOnce(),
    {
        let mut old = Vec::new();
        for (k, v) in vars {
            old.push((k.to_string(), env::var(k).ok()));
            env::set_var(k, v);
        }
        test();
        for (k, maybe_old) in old {
            match maybe_old {
                Some(val) => env::set_var(k, val),
                None => env::remove_var(k),
            }
        }
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = ServerConfig::load(None).expect("load default config");
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.max_hops, 3);
        assert_eq!(cfg.peer_refresh_interval, Duration::from_secs(60));
        assert_eq!(cfg.rate_limit_capacity, 100.0);
        assert!(cfg.s3_bucket.is_none());
        assert_eq!(cfg.tiers.len(), 4);
    }

    #[test]
    fn env_vars_override_defaults() {
        with_env(
            &[
                ("GATEWAY_LISTEN_ADDR", "127.0.0.1:9999"),
                ("GATEWAY_MAX_HOPS", "5"),
                ("GATEWAY_PEER_REFRESH_INTERVAL", "30s"),
                ("GATEWAY_IP_ALLOWLIST", "10.0.0.1,10.0.0.2"),
            ],
            || {
                let cfg = ServerConfig::load(None).expect("load config");
                assert_eq!(cfg.listen_addr, "127.0.0.1:9999");
                assert_eq!(cfg.max_hops, 5);
                assert_eq!(cfg.peer_refresh_interval, Duration::from_secs(30));
                assert_eq!(
                    cfg.ip_allowlist,
                    vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]
                );
            },
        );
    }

    #[test]
    fn file_overrides_take_precedence_over_defaults() {
        use std::io::Write;

        let mut tmp = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            tmp,
            r#"
listen_addr = "0.0.0.0:7000"
max_hops = 7
trusted_gateway_tiers = [["https://g1.example"], ["https://g2.example", "https://g3.example"]]
"#
        )
        .expect("write config");

        let cfg = ServerConfig::load(Some(PathBuf::from(tmp.path()))).expect("load config");
        assert_eq!(cfg.listen_addr, "0.0.0.0:7000");
        assert_eq!(cfg.max_hops, 7);
        assert_eq!(cfg.trusted_gateway_tiers.len(), 2);
    }

    #[test]
    fn runtime_config_carries_over_every_tuned_field() {
        let cfg = ServerConfig::load(None).expect("load config");
        let runtime = cfg.runtime_config();
        assert_eq!(runtime.max_hops, cfg.max_hops);
        assert_eq!(runtime.cache_root, cfg.cache_root);
        assert_eq!(runtime.rate_limit_capacity, cfg.rate_limit_capacity);
    }
}
