//! Per-environment snapshot cache.
//!
//! # Responsibilities
//! - Serve compiled environment snapshots without touching the store
//! - Fetch and compile on miss
//! - Drop entries on explicit invalidation (push, never time-based)
//!
//! # Design Decisions
//! - Entries are `Arc<EnvironmentSnapshot>`; replacing one never mutates
//!   what in-flight requests are reading
//! - An invalidation epoch stops a fetch that overlapped an invalidation
//!   from caching what it read

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::StoreError;
use crate::observability::metrics;
use crate::routing::snapshot::EnvironmentSnapshot;
use crate::store::SnapshotSource;

pub struct SnapshotCache<S> {
    source: S,
    entries: DashMap<String, Arc<EnvironmentSnapshot>>,
    epoch: AtomicU64,
}

impl<S: SnapshotSource> SnapshotCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    /// Cached snapshot for `env_id`, fetching and compiling it on a miss.
    ///
    /// `Ok(None)` means the store doesn't know the environment.
    pub async fn get(&self, env_id: &str) -> Result<Option<Arc<EnvironmentSnapshot>>, StoreError> {
        if let Some(hit) = self.entries.get(env_id).map(|e| e.value().clone()) {
            metrics::record_cache("hit");
            return Ok(Some(hit));
        }
        metrics::record_cache("miss");

        let epoch = self.epoch.load(Ordering::Acquire);
        let Some(record) = self.source.fetch(env_id).await? else {
            return Ok(None);
        };
        let snapshot = Arc::new(EnvironmentSnapshot::build(record));

        self.entries.insert(env_id.to_string(), snapshot.clone());
        if self.epoch.load(Ordering::Acquire) != epoch {
            // Invalidated while fetching: serve this read, don't keep it.
            self.entries
                .remove_if(env_id, |_, cached| Arc::ptr_eq(cached, &snapshot));
            tracing::debug!(env_id, "Discarding snapshot fetched across an invalidation");
        }
        Ok(Some(snapshot))
    }

    /// Drop one environment's snapshot.
    pub fn invalidate(&self, env_id: &str) -> bool {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let removed = self.entries.remove(env_id).is_some();
        tracing::info!(env_id, removed, "Snapshot invalidated");
        removed
    }

    /// Drop every snapshot, e.g. after a catalog reload.
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let count = self.entries.len();
        self.entries.clear();
        tracing::info!(count, "All snapshots invalidated");
    }

    /// Install a prebuilt snapshot, replacing any cached one.
    pub fn replace(&self, snapshot: EnvironmentSnapshot) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries
            .insert(snapshot.env_id.clone(), Arc::new(snapshot));
    }

    /// Ids of the environments currently cached.
    pub fn cached_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RedirectRule;
    use crate::store::EnvironmentRecord;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicUsize,
    }

    impl SnapshotSource for CountingSource {
        async fn fetch(&self, env_id: &str) -> Result<Option<EnvironmentRecord>, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if env_id == "missing" {
                return Ok(None);
            }
            if env_id == "broken" {
                return Err(StoreError::Unavailable("database down".into()));
            }
            Ok(Some(EnvironmentRecord {
                env_id: env_id.to_string(),
                redirects: vec![RedirectRule::new("/a", "/b", 301)],
                ..Default::default()
            }))
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = SnapshotCache::new(CountingSource::default());
        let first = cache.get("prod").await.unwrap().unwrap();
        let second = cache.get("prod").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.rules.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = SnapshotCache::new(CountingSource::default());
        let first = cache.get("prod").await.unwrap().unwrap();
        assert!(cache.invalidate("prod"));
        assert!(!cache.invalidate("prod"));
        let second = cache.get("prod").await.unwrap().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.source.fetches.load(Ordering::SeqCst), 2);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_failing_environments() {
        let cache = SnapshotCache::new(CountingSource::default());
        assert!(cache.get("missing").await.unwrap().is_none());
        assert!(matches!(cache.get("broken").await, Err(StoreError::Unavailable(_))));
        assert!(cache.cached_ids().is_empty());
    }

    struct GatedSource {
        entered: Notify,
        release: Notify,
    }

    impl SnapshotSource for GatedSource {
        async fn fetch(&self, env_id: &str) -> Result<Option<EnvironmentRecord>, StoreError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Some(EnvironmentRecord {
                env_id: env_id.to_string(),
                ..Default::default()
            }))
        }
    }

    #[tokio::test]
    async fn test_fetch_racing_invalidation_is_not_cached() {
        let cache = Arc::new(SnapshotCache::new(GatedSource {
            entered: Notify::new(),
            release: Notify::new(),
        }));

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("prod").await })
        };
        cache.source.entered.notified().await;
        cache.invalidate("prod");
        cache.source.release.notify_one();

        let served = reader.await.unwrap().unwrap();
        assert!(served.is_some());
        assert!(cache.is_empty());
    }
}
