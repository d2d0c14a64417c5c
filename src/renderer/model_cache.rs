//! Per-frame dynamic model cache
//!
//! Transient models with identical content share one push into the temp buffers. Entries are
//! stamped with the frame that created them and the whole map is dropped at frame start, so a
//! lookup never returns geometry pushed in another frame.

use rustc_hash::FxHashMap;

/// Offsets of a push into the per-frame temp buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedPush {
    pub temp_vertex_offset: i32,
    /// `-1` when the pushed model had no UVs
    pub temp_uv_offset: i32,
    pub triangle_count: u32,
    pub frame: u64,
}

/// Result of a cache lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(CachedPush),
    Miss,
    /// An entry exists but its triangle count differs; geometry must be pushed again
    Stale(CachedPush),
}

/// Lookup counters for the current frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
    pub stale: u32,
}

pub struct DynamicModelCache {
    entries: FxHashMap<u64, CachedPush>,
    frame: u64,
    stats: CacheStats,
}

impl DynamicModelCache {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            frame: 0,
            stats: CacheStats::default(),
        }
    }

    /// Drop every entry and start stamping with `frame`
    pub fn begin_frame(&mut self, frame: u64) {
        self.entries.clear();
        self.frame = frame;
        self.stats = CacheStats::default();
    }

    pub fn lookup(&mut self, hash: u64, triangle_count: u32) -> CacheLookup {
        match self.entries.get(&hash) {
            Some(entry) if entry.frame != self.frame => {
                self.stats.misses += 1;
                CacheLookup::Miss
            }
            Some(entry) if entry.triangle_count == triangle_count => {
                self.stats.hits += 1;
                CacheLookup::Hit(*entry)
            }
            Some(entry) => {
                self.stats.stale += 1;
                CacheLookup::Stale(*entry)
            }
            None => {
                self.stats.misses += 1;
                CacheLookup::Miss
            }
        }
    }

    /// Record (or replace) the push for `hash` in the current frame
    pub fn insert(&mut self, hash: u64, temp_vertex_offset: i32, temp_uv_offset: i32, triangle_count: u32) {
        self.entries.insert(
            hash,
            CachedPush {
                temp_vertex_offset,
                temp_uv_offset,
                triangle_count,
                frame: self.frame,
            },
        );
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl Default for DynamicModelCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_frame() {
        let mut cache = DynamicModelCache::new();
        cache.begin_frame(1);
        assert_eq!(cache.lookup(42, 600), CacheLookup::Miss);

        cache.insert(42, 30, -1, 600);
        match cache.lookup(42, 600) {
            CacheLookup::Hit(entry) => {
                assert_eq!(entry.temp_vertex_offset, 30);
                assert_eq!(entry.temp_uv_offset, -1);
            }
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, stale: 0 });
    }

    #[test]
    fn test_triangle_count_mismatch_is_stale() {
        let mut cache = DynamicModelCache::new();
        cache.begin_frame(1);
        cache.insert(42, 0, 0, 10);

        assert!(matches!(cache.lookup(42, 11), CacheLookup::Stale(_)));
    }

    #[test]
    fn test_entries_do_not_cross_frames() {
        let mut cache = DynamicModelCache::new();
        cache.begin_frame(1);
        cache.insert(42, 0, 0, 10);

        cache.begin_frame(2);
        assert!(cache.is_empty());
        assert_eq!(cache.lookup(42, 10), CacheLookup::Miss);
    }
}
