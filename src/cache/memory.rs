//! In-memory tile cache with LRU eviction.

use crate::cache::types::{CacheStats, TileKey};
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Entry in the tile cache.
///
/// Entries are replaced, never mutated: a re-render of the same key inserts
/// a fresh entry over the old one.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Decoded tile image, shared with readers
    image: Arc<RgbaImage>,
    /// When the image was rendered
    generated_at: Instant,
    /// Decoded size used for the size gauge
    size_bytes: usize,
    /// LRU sequence number, larger = more recently used
    last_used: u64,
}

/// Bounded in-memory cache of rendered tile images.
///
/// Capacity is a maximum entry count rather than a byte budget, which keeps
/// the at-capacity decision O(1). Eviction is least-recently-used: every hit
/// promotes the entry, and an insert at capacity evicts exactly one entry.
///
/// The cache is safe for concurrent use from multiple analysis workers. Two
/// workers missing the same key may both render; the second `put` wins.
/// Renders are idempotent for a given key, so the redundant work is a cost,
/// not a correctness problem.
pub struct TileCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    entries: HashMap<TileKey, CacheEntry>,
    tick: u64,
    stats: CacheStats,
}

impl TileCache {
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be > 0");
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
                stats: CacheStats::default(),
            }),
            capacity,
        }
    }

    /// Looks up a tile image, promoting the entry on hit.
    pub fn get(&self, key: &TileKey) -> Option<Arc<RgbaImage>> {
        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        let found = match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = tick;
                Some(Arc::clone(&entry.image))
            }
            None => None,
        };

        match found {
            Some(image) => {
                inner.stats.hits += 1;
                Some(image)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Inserts a rendered tile, evicting the least-recently-used entry if
    /// the cache is at capacity.
    ///
    /// Returns the shared handle to the stored image so callers can keep
    /// using it without another lookup. Re-inserting an existing key
    /// replaces the entry without evicting anything else.
    pub fn put(&self, key: TileKey, image: RgbaImage) -> Arc<RgbaImage> {
        let size_bytes = image.as_raw().len();
        let image = Arc::new(image);

        let mut inner = self.inner.lock().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            self.evict_lru(&mut inner);
        }

        let previous = inner.entries.insert(
            key,
            CacheEntry {
                image: Arc::clone(&image),
                generated_at: Instant::now(),
                size_bytes,
                last_used: tick,
            },
        );

        inner.stats.size_bytes += size_bytes;
        if let Some(previous) = previous {
            inner.stats.size_bytes -= previous.size_bytes;
        }
        inner.stats.entry_count = inner.entries.len();

        image
    }

    /// Returns true if the key is currently cached.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.inner.lock().unwrap().entries.contains_key(key)
    }

    /// Drops every entry.
    ///
    /// Called whenever the grid configuration or the source layout changes:
    /// stale geometry makes every cached bitmap meaningless regardless of
    /// how recently it was used.
    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        let dropped = inner.entries.len() as u64;
        inner.entries.clear();
        inner.stats.invalidations += dropped;
        inner.stats.entry_count = 0;
        inner.stats.size_bytes = 0;
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured maximum entry count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().unwrap().stats.clone()
    }

    /// Age of the cached entry, if present.
    pub fn entry_age(&self, key: &TileKey) -> Option<std::time::Duration> {
        let inner = self.inner.lock().unwrap();
        inner.entries.get(key).map(|e| e.generated_at.elapsed())
    }

    /// Removes the single least-recently-used entry.
    fn evict_lru(&self, inner: &mut Inner) {
        let victim = inner
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| *key);

        if let Some(key) = victim {
            if let Some(entry) = inner.entries.remove(&key) {
                inner.stats.size_bytes -= entry.size_bytes;
                inner.stats.evictions += 1;
                tracing::debug!(key = %key.address, "evicted least-recently-used tile");
            }
        }
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("TileCache")
            .field("capacity", &self.capacity)
            .field("entries", &inner.entries.len())
            .finish()
    }
}
