use std::collections::{BTreeSet, HashMap};

/// Initial weight assigned to a peer the first time it is seen.
pub const INITIAL_WEIGHT: i32 = 50;
pub const MIN_WEIGHT: i32 = 1;
pub const MAX_WEIGHT: i32 = 100;
/// A pool member at or below this weight is considered degraded; if it is
/// still degraded at the next refresh it is dropped from the table.
pub const DEGRADED_WEIGHT_THRESHOLD: i32 = 10;

/// One of the three categorized weighted pools a peer can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerCategory {
    Chain,
    GetChunk,
    PostChunk,
}

/// Derived peer status; not stored, always computed from the current
/// weight and pool membership (there is no explicit "dead" state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Unknown,
    Alive,
    Degraded,
}

/// Everything the peer manager knows about one upstream host.
#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub url: String,
    pub blocks: u64,
    pub height: u64,
    pub last_seen: u64,
    pub sync_buckets: Option<BTreeSet<u32>>,
    pub buckets_last_updated: Option<u64>,
}

impl PeerEntry {
    pub fn new(url: String, blocks: u64, height: u64, last_seen: u64) -> Self {
        Self {
            url,
            blocks,
            height,
            last_seen,
            sync_buckets: None,
            buckets_last_updated: None,
        }
    }
}

/// A weighted member of a category pool, as returned by selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedPeer {
    pub id: String,
    pub weight: i32,
}

/// Process-wide peer state: one `PeerEntry` table plus three independent
/// weighted pools. Mutated only by the peer manager's refresh and
/// feedback methods; readers take a brief lock and copy the slice they need.
#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    pub peers: HashMap<String, PeerEntry>,
    pub chain: HashMap<String, i32>,
    pub get_chunk: HashMap<String, i32>,
    pub post_chunk: HashMap<String, i32>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(&self, category: PeerCategory) -> &HashMap<String, i32> {
        match category {
            PeerCategory::Chain => &self.chain,
            PeerCategory::GetChunk => &self.get_chunk,
            PeerCategory::PostChunk => &self.post_chunk,
        }
    }

    pub fn pool_mut(&mut self, category: PeerCategory) -> &mut HashMap<String, i32> {
        match category {
            PeerCategory::Chain => &mut self.chain,
            PeerCategory::GetChunk => &mut self.get_chunk,
            PeerCategory::PostChunk => &mut self.post_chunk,
        }
    }

    pub fn status_of(&self, category: PeerCategory, id: &str) -> PeerStatus {
        match self.pool(category).get(id) {
            None => PeerStatus::Unknown,
            Some(&weight) if weight <= DEGRADED_WEIGHT_THRESHOLD => PeerStatus::Degraded,
            Some(_) => PeerStatus::Alive,
        }
    }

    /// Increments `id`'s weight in `category`, clamped to `MAX_WEIGHT`;
    /// peers not yet in the pool start from `INITIAL_WEIGHT`.
    pub fn report_success(&mut self, category: PeerCategory, id: &str) {
        let pool = self.pool_mut(category);
        let weight = pool.entry(id.to_string()).or_insert(INITIAL_WEIGHT);
        *weight = (*weight + 1).min(MAX_WEIGHT);
    }

    /// Decrements `id`'s weight in `category`, clamped to `MIN_WEIGHT`.
    pub fn report_failure(&mut self, category: PeerCategory, id: &str) {
        let pool = self.pool_mut(category);
        let weight = pool.entry(id.to_string()).or_insert(INITIAL_WEIGHT);
        *weight = (*weight - 1).max(MIN_WEIGHT);
    }

    /// Peers in `getChunk` whose declared sync buckets include `bucket`.
    pub fn peers_for_bucket(&self, bucket: u32) -> Vec<(String, i32)> {
        self.get_chunk
            .iter()
            .filter(|(id, _)| {
                self.peers
                    .get(*id)
                    .and_then(|p| p.sync_buckets.as_ref())
                    .is_some_and(|buckets| buckets.contains(&bucket))
            })
            .map(|(id, &weight)| (id.clone(), weight))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{PeerCategory, PeerEntry, PeerStatus, PeerTable, DEGRADED_WEIGHT_THRESHOLD};

    #[test]
    fn new_peer_starts_unknown_then_alive_after_first_report() {
        let mut table = PeerTable::new();
        assert_eq!(
            table.status_of(PeerCategory::GetChunk, "p1"),
            PeerStatus::Unknown
        );
        table.report_success(PeerCategory::GetChunk, "p1");
        assert_eq!(
            table.status_of(PeerCategory::GetChunk, "p1"),
            PeerStatus::Alive
        );
    }

    #[test]
    fn weight_clamps_at_bounds_after_many_reports() {
        let mut table = PeerTable::new();
        for _ in 0..200 {
            table.report_success(PeerCategory::Chain, "p1");
        }
        assert_eq!(table.chain.get("p1"), Some(&100));
        for _ in 0..200 {
            table.report_failure(PeerCategory::Chain, "p1");
        }
        assert_eq!(table.chain.get("p1"), Some(&1));
    }

    #[test]
    fn weight_at_or_below_threshold_is_degraded() {
        let mut table = PeerTable::new();
        table.report_success(PeerCategory::Chain, "p1");
        for _ in 0..40 {
            table.report_failure(PeerCategory::Chain, "p1");
        }
        assert!(table.chain["p1"] <= DEGRADED_WEIGHT_THRESHOLD);
        assert_eq!(
            table.status_of(PeerCategory::Chain, "p1"),
            PeerStatus::Degraded
        );
    }

    #[test]
    fn peers_for_bucket_filters_by_declared_sync_buckets() {
        let mut table = PeerTable::new();
        table.get_chunk.insert("p1".to_string(), 50);
        table.get_chunk.insert("p2".to_string(), 50);
        let mut entry = PeerEntry::new("p1".to_string(), 0, 0, 0);
        entry.sync_buckets = Some([1, 2].into_iter().collect());
        table.peers.insert("p1".to_string(), entry);

        let matches = table.peers_for_bucket(2);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, "p1");
    }
}
