//! Raw-record cache.
//!
//! Record sets are cached per (source identity, load version) and shared as
//! `Arc<RecordSet>`. Entries are only dropped by an explicit
//! [`RecordCache::invalidate`] or [`RecordCache::bump_version`]. A load that
//! finishes after its version was bumped is returned but not kept.

use std::sync::Arc;

use dashmap::DashMap;

use tempora_core::error::TemporaResult;
use tempora_core::source::RecordSource;
use tempora_core::types::RecordSet;

/// Cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Source identity.
    pub source: String,
    /// Load version of the source.
    pub version: u64,
}

/// Concurrent cache of loaded record sets.
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: DashMap<CacheKey, Arc<RecordSet>>,
    versions: DashMap<String, u64>,
}

impl RecordCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current load version of a source. Sources start at version 0.
    pub fn version(&self, source_id: &str) -> u64 {
        self.versions.get(source_id).map_or(0, |v| *v)
    }

    fn key(&self, source_id: &str) -> CacheKey {
        CacheKey {
            source: source_id.to_string(),
            version: self.version(source_id),
        }
    }

    /// Cached records of a source at its current version.
    pub fn get(&self, source_id: &str) -> Option<Arc<RecordSet>> {
        self.entries
            .get(&self.key(source_id))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the cached records, loading the source on first access.
    ///
    /// A failed load is not cached.
    pub fn get_or_load<S: RecordSource + ?Sized>(
        &self,
        source: &S,
    ) -> TemporaResult<Arc<RecordSet>> {
        let key = self.key(source.source_id());
        if let Some(hit) = self.entries.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let loaded = Arc::new(source.load()?);
        // a concurrent loader may have won; keep the first set stored
        let stored = Arc::clone(self.entries.entry(key.clone()).or_insert(loaded).value());
        if self.drop_if_stale(&key) {
            return Ok(stored);
        }
        tracing::info!(
            source = %key.source,
            version = key.version,
            records = stored.len(),
            "Cached record source"
        );
        Ok(stored)
    }

    /// Stores an already loaded record set at the source's current version.
    pub fn insert(&self, source_id: &str, records: RecordSet) -> Arc<RecordSet> {
        let records = Arc::new(records);
        let key = self.key(source_id);
        self.entries.insert(key.clone(), Arc::clone(&records));
        self.drop_if_stale(&key);
        records
    }

    // bump_version increments before it retains, so an entry stored under an
    // old version is removed either by that retain or here.
    fn drop_if_stale(&self, key: &CacheKey) -> bool {
        if self.version(&key.source) == key.version {
            return false;
        }
        self.entries.remove(key);
        tracing::debug!(
            source = %key.source,
            version = key.version,
            "Dropped records loaded under a superseded version"
        );
        true
    }

    /// Drops every cached version of a source. Returns true if anything was
    /// removed.
    pub fn invalidate(&self, source_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.source != source_id);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::info!(source = source_id, removed, "Invalidated record source");
        }
        removed > 0
    }

    /// Moves a source to its next load version and drops older entries.
    pub fn bump_version(&self, source_id: &str) -> u64 {
        let version = {
            let mut version = self.versions.entry(source_id.to_string()).or_insert(0);
            *version += 1;
            *version
        };
        self.entries
            .retain(|key, _| key.source != source_id || key.version >= version);
        tracing::debug!(source = source_id, version, "Bumped source version");
        version
    }

    /// Number of cached record sets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry. Versions are kept.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempora_core::error::TemporaError;
    use tempora_core::types::{Record, RecordSchema};

    struct CountingSource {
        loads: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl RecordSource for CountingSource {
        fn source_id(&self) -> &str {
            "counting"
        }

        fn load(&self) -> TemporaResult<RecordSet> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TemporaError::source_load("counting", "unavailable"));
            }
            let schema = RecordSchema::new("DATE_DAY");
            let records = (0..=n).map(|_| Record::new("2024-01-01", vec![], vec![])).collect();
            RecordSet::new(schema, records)
        }
    }

    #[test]
    fn test_cache_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RecordCache>();
    }

    #[test]
    fn test_loads_once() {
        let cache = RecordCache::new();
        let source = CountingSource::new(false);

        let first = cache.get_or_load(&source).unwrap();
        let second = cache.get_or_load(&source).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_load_not_cached() {
        let cache = RecordCache::new();
        let source = CountingSource::new(true);
        assert!(cache.get_or_load(&source).is_err());
        assert!(cache.get_or_load(&source).is_err());
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_and_bump_version() {
        let cache = RecordCache::new();
        let source = CountingSource::new(false);

        assert_eq!(cache.get_or_load(&source).unwrap().len(), 1);
        assert!(cache.invalidate("counting"));
        assert!(!cache.invalidate("counting"));
        assert_eq!(cache.get_or_load(&source).unwrap().len(), 2);

        assert_eq!(cache.bump_version("counting"), 1);
        assert!(cache.get("counting").is_none());
        assert_eq!(cache.get_or_load(&source).unwrap().len(), 3);
        assert_eq!(cache.version("counting"), 1);
        assert_eq!(cache.len(), 1);
    }

    struct BumpingSource<'c> {
        cache: &'c RecordCache,
    }

    impl RecordSource for BumpingSource<'_> {
        fn source_id(&self) -> &str {
            "bumping"
        }

        fn load(&self) -> TemporaResult<RecordSet> {
            // the source changes while it is being read
            self.cache.bump_version("bumping");
            RecordSet::new(RecordSchema::new("DATE_DAY"), vec![])
        }
    }

    #[test]
    fn test_load_superseded_by_bump_is_not_kept() {
        let cache = RecordCache::new();
        let source = BumpingSource { cache: &cache };

        assert!(cache.get_or_load(&source).is_ok());
        assert_eq!(cache.version("bumping"), 1);
        assert!(cache.get("bumping").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_readers_share_one_set() {
        let cache = RecordCache::new();
        let source = CountingSource::new(false);

        let sets: Vec<Arc<RecordSet>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| cache.get_or_load(&source).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let stored = cache.get("counting").unwrap();
        assert!(sets.iter().all(|s| Arc::ptr_eq(s, &stored)));
    }
}
