use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;

/// Memoizes an expensive per-program enrichment lookup for the lifetime of
/// one run.
///
/// Failed lookups are cached too (negative caching): a program id is asked
/// of the enrichment collaborator at most once, ever. There is no eviction
/// and no TTL; the cache is dropped with the run.
pub struct ProgramDetailCache<V> {
    entries: HashMap<String, CacheSlot<V>>,
}

struct CacheSlot<V> {
    value: Option<V>,
    hits: u64,
}

impl<V> ProgramDetailCache<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Looks up `program_id`, invoking `enrich` only on the first call for
    /// that id; the stored result is reused afterwards even when it was a
    /// failure. Every call bumps the entry's hit counter. Blank program
    /// ids bypass the cache entirely and are never enriched.
    pub async fn get_or_fetch<F, Fut>(&mut self, program_id: &str, enrich: F) -> Option<&V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>>,
    {
        if program_id.trim().is_empty() {
            return None;
        }
        let slot = match self.entries.entry(program_id.to_string()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let value = enrich().await;
                vacant.insert(CacheSlot { value, hits: 0 })
            }
        };
        slot.hits += 1;
        slot.value.as_ref()
    }

    /// Hit count for an id, `None` if it was never populated.
    pub fn hits(&self, program_id: &str) -> Option<u64> {
        self.entries.get(program_id).map(|slot| slot.hits)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for ProgramDetailCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn enrichment_runs_once_per_program_id() {
        let calls = Cell::new(0u32);
        let mut cache = ProgramDetailCache::new();

        for _ in 0..3 {
            let detail = cache
                .get_or_fetch("P123", || async {
                    calls.set(calls.get() + 1);
                    Some("synopsis".to_string())
                })
                .await;
            assert_eq!(detail.map(String::as_str), Some("synopsis"));
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.hits("P123"), Some(3));
    }

    #[tokio::test]
    async fn failed_lookups_are_negatively_cached() {
        let calls = Cell::new(0u32);
        let mut cache: ProgramDetailCache<String> = ProgramDetailCache::new();

        for _ in 0..2 {
            let detail = cache
                .get_or_fetch("P404", || async {
                    calls.set(calls.get() + 1);
                    None
                })
                .await;
            assert!(detail.is_none());
        }

        // The failure is a result, not an invitation to retry.
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.hits("P404"), Some(2));
    }

    #[tokio::test]
    async fn blank_program_ids_bypass_the_cache() {
        let calls = Cell::new(0u32);
        let mut cache: ProgramDetailCache<String> = ProgramDetailCache::new();

        for id in ["", "  "] {
            let detail = cache
                .get_or_fetch(id, || async {
                    calls.set(calls.get() + 1);
                    Some("x".to_string())
                })
                .await;
            assert!(detail.is_none());
        }

        assert_eq!(calls.get(), 0);
        assert!(cache.is_empty());
    }
}
