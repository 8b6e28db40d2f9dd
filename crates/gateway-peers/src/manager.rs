use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio::sync::RwLock;

use gateway_codec::etf::parse_sync_buckets;

use crate::dns::DnsResolver;
use crate::error::PeerError;
use crate::state::{PeerCategory, PeerEntry, PeerTable, WeightedPeer, INITIAL_WEIGHT, MAX_WEIGHT};
use crate::weighted::sample_weighted;

/// A peer's default sync-bucket width until the first `/sync_buckets`
/// response reports an authoritative value: 10 GiB.
const DEFAULT_BUCKET_SIZE: u64 = 10 * 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct PeerManagerConfig {
    pub trusted_node_url: String,
    pub ignore_hosts: HashSet<String>,
    pub preferred_get_chunk: Vec<String>,
    pub preferred_post_chunk: Vec<String>,
    pub refresh_interval: Duration,
    pub info_timeout: Duration,
    pub info_fetch_concurrency: usize,
}

impl Default for PeerManagerConfig {
    fn default() -> Self {
        Self {
            trusted_node_url: String::new(),
            ignore_hosts: HashSet::new(),
            preferred_get_chunk: Vec::new(),
            preferred_post_chunk: Vec::new(),
            refresh_interval: Duration::from_secs(60),
            info_timeout: Duration::from_secs(1),
            info_fetch_concurrency: 16,
        }
    }
}

#[derive(Deserialize)]
struct InfoResponse {
    #[serde(default)]
    blocks: u64,
    #[serde(default)]
    height: u64,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Maintains the categorized weighted peer pools and the sync-bucket map,
/// refreshed periodically from a trusted node.
pub struct PeerManager {
    table: Arc<RwLock<PeerTable>>,
    http: reqwest::Client,
    config: PeerManagerConfig,
    bucket_size: AtomicU64,
    dns: Option<Arc<dyn DnsResolver>>,
}

impl PeerManager {
    pub fn new(config: PeerManagerConfig, http: reqwest::Client) -> Self {
        Self {
            table: Arc::new(RwLock::new(PeerTable::new())),
            http,
            config,
            bucket_size: AtomicU64::new(DEFAULT_BUCKET_SIZE),
            dns: None,
        }
    }

    pub fn with_dns_resolver(mut self, resolver: Arc<dyn DnsResolver>) -> Self {
        self.dns = Some(resolver);
        self
    }

    pub fn table(&self) -> Arc<RwLock<PeerTable>> {
        Arc::clone(&self.table)
    }

    pub async fn report_success(&self, category: PeerCategory, id: &str) {
        self.table.write().await.report_success(category, id);
    }

    pub async fn report_failure(&self, category: PeerCategory, id: &str) {
        self.table.write().await.report_failure(category, id);
    }

    /// Weighted random sample without replacement from `category`.
    pub async fn select_peers(&self, category: PeerCategory, n: usize) -> Vec<WeightedPeer> {
        let table = self.table.read().await;
        let entries: Vec<(String, i32)> = table
            .pool(category)
            .iter()
            .map(|(id, &w)| (id.clone(), w))
            .collect();
        let mut rng = rand::thread_rng();
        sample_weighted(&entries, n, &mut rng)
            .into_iter()
            .map(|id| {
                let weight = *table.pool(category).get(&id).unwrap_or(&INITIAL_WEIGHT);
                WeightedPeer { id, weight }
            })
            .collect()
    }

    /// Weighted sample restricted to `getChunk` peers that declare holding
    /// `absolute_offset`'s bucket; falls back to an unrestricted sample if
    /// no peer has reported that bucket.
    pub async fn select_peers_for_offset(&self, absolute_offset: u64, n: usize) -> Vec<WeightedPeer> {
        let bucket_size = self.bucket_size.load(Ordering::Relaxed);
        let bucket = (absolute_offset / bucket_size) as u32;
        let table = self.table.read().await;
        let restricted = table.peers_for_bucket(bucket);
        drop(table);
        if restricted.is_empty() {
            return self.select_peers(PeerCategory::GetChunk, n).await;
        }
        let mut rng = rand::thread_rng();
        let sampled = sample_weighted(&restricted, n, &mut rng);
        sampled
            .into_iter()
            .map(|id| {
                let weight = restricted
                    .iter()
                    .find(|(pid, _)| pid == &id)
                    .map(|(_, w)| *w)
                    .unwrap_or(INITIAL_WEIGHT);
                WeightedPeer { id, weight }
            })
            .collect()
    }

    /// Runs one full refresh cycle: peer list, per-peer `/info`, then
    /// triggers a sync-bucket refresh round.
    pub async fn refresh(&self) -> Result<(), PeerError> {
        let hosts = self.fetch_peer_list().await?;
        let hosts: Vec<String> = hosts
            .into_iter()
            .filter(|h| !self.config.ignore_hosts.contains(h))
            .collect();

        let concurrency = self.config.info_fetch_concurrency.max(1);
        let info_timeout = self.config.info_timeout;
        let http = self.http.clone();
        let infos: Vec<(String, Option<InfoResponse>)> = stream::iter(hosts.into_iter())
            .map(|host| {
                let http = http.clone();
                async move {
                    let info = fetch_info(&http, &host, info_timeout).await.ok();
                    (host, info)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let now = now_unix();
        let mut table = self.table.write().await;
        let previous_weights = (
            table.chain.clone(),
            table.get_chunk.clone(),
            table.post_chunk.clone(),
        );

        table.peers.clear();
        table.chain.clear();
        table.get_chunk.clear();
        table.post_chunk.clear();

        for (host, info) in infos {
            let (blocks, height) = match info {
                Some(i) => (i.blocks, i.height),
                None => continue,
            };
            table.peers.insert(host.clone(), PeerEntry::new(host.clone(), blocks, height, now));
            for (pool, prev) in [
                (&mut table.chain, &previous_weights.0),
                (&mut table.get_chunk, &previous_weights.1),
                (&mut table.post_chunk, &previous_weights.2),
            ] {
                let weight = prev.get(&host).copied().unwrap_or(INITIAL_WEIGHT);
                pool.insert(host.clone(), weight);
            }
        }

        for preferred in &self.config.preferred_get_chunk {
            table.get_chunk.insert(preferred.clone(), MAX_WEIGHT);
        }
        for preferred in &self.config.preferred_post_chunk {
            table.post_chunk.insert(preferred.clone(), MAX_WEIGHT);
        }
        drop(table);

        self.refresh_sync_buckets().await?;
        Ok(())
    }

    async fn fetch_peer_list(&self) -> Result<Vec<String>, PeerError> {
        let url = format!("{}/peers", self.config.trusted_node_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PeerError::PeerListUnavailable(e.to_string()))?;
        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| PeerError::PeerListUnavailable(e.to_string()))
    }

    /// Fetches `/sync_buckets` from every known peer and updates its entry.
    pub async fn refresh_sync_buckets(&self) -> Result<(), PeerError> {
        let hosts: Vec<String> = self.table.read().await.peers.keys().cloned().collect();
        let http = self.http.clone();
        let results: Vec<(String, Option<Vec<u8>>)> = stream::iter(hosts.into_iter())
            .map(|host| {
                let http = http.clone();
                async move {
                    let body = fetch_sync_buckets(&http, &host).await.ok();
                    (host, body)
                }
            })
            .buffer_unordered(self.config.info_fetch_concurrency.max(1))
            .collect()
            .await;

        let now = now_unix();
        let mut table = self.table.write().await;
        for (host, body) in results {
            let Some(body) = body else { continue };
            let Ok(parsed) = parse_sync_buckets(&body) else {
                continue;
            };
            self.bucket_size.store(parsed.bucket_size, Ordering::Relaxed);
            if let Some(entry) = table.peers.get_mut(&host) {
                entry.sync_buckets = Some(parsed.buckets);
                entry.buckets_last_updated = Some(now);
            }
        }
        Ok(())
    }

    /// Resolves preferred peer URLs to their IP form via the configured
    /// resolver, if any; a no-op otherwise.
    pub async fn resolve_preferred(&self) -> Vec<(String, String)> {
        let Some(resolver) = &self.dns else {
            return Vec::new();
        };
        let mut resolved = Vec::new();
        for host in self
            .config
            .preferred_get_chunk
            .iter()
            .chain(self.config.preferred_post_chunk.iter())
        {
            if let Some(ip) = resolver.resolve(host).await {
                resolved.push((host.clone(), ip));
            }
        }
        resolved
    }
}

async fn fetch_info(
    http: &reqwest::Client,
    host: &str,
    timeout: Duration,
) -> Result<InfoResponse, PeerError> {
    let url = format!("http://{host}/info");
    let response = tokio::time::timeout(timeout, http.get(&url).send())
        .await
        .map_err(|_| PeerError::InfoUnavailable {
            peer: host.to_string(),
            source: "timed out".to_string(),
        })?
        .map_err(|e| PeerError::InfoUnavailable {
            peer: host.to_string(),
            source: e.to_string(),
        })?;
    response
        .json::<InfoResponse>()
        .await
        .map_err(|e| PeerError::InfoUnavailable {
            peer: host.to_string(),
            source: e.to_string(),
        })
}

async fn fetch_sync_buckets(http: &reqwest::Client, host: &str) -> Result<Vec<u8>, PeerError> {
    let url = format!("http://{host}/sync_buckets");
    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| PeerError::SyncBucketsUnavailable {
            peer: host.to_string(),
            source: e.to_string(),
        })?;
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| PeerError::SyncBucketsUnavailable {
            peer: host.to_string(),
            source: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{PeerManager, PeerManagerConfig};
    use crate::state::{PeerCategory, INITIAL_WEIGHT};

    #[tokio::test]
    async fn report_success_and_failure_adjust_weight_for_unknown_peer() {
        let manager = PeerManager::new(PeerManagerConfig::default(), reqwest::Client::new());
        manager.report_success(PeerCategory::Chain, "p1").await;
        let table = manager.table();
        assert_eq!(table.read().await.chain["p1"], INITIAL_WEIGHT + 1);
    }

    #[tokio::test]
    async fn select_peers_never_returns_more_than_pool_size() {
        let manager = PeerManager::new(PeerManagerConfig::default(), reqwest::Client::new());
        manager.report_success(PeerCategory::GetChunk, "a").await;
        manager.report_success(PeerCategory::GetChunk, "b").await;
        let selected = manager.select_peers(PeerCategory::GetChunk, 10).await;
        assert_eq!(selected.len(), 2);
    }

    #[tokio::test]
    async fn select_peers_for_offset_falls_back_when_no_peer_declares_bucket() {
        let manager = PeerManager::new(PeerManagerConfig::default(), reqwest::Client::new());
        manager.report_success(PeerCategory::GetChunk, "a").await;
        let selected = manager.select_peers_for_offset(0, 5).await;
        assert_eq!(selected.len(), 1);
    }
}
