//! Core types for the tile cache.

use crate::coord::TileAddress;

/// Cache key uniquely identifying a rendered tile image.
///
/// The same address may be rendered at preview resolution and analysis
/// resolution independently, so lookups always key on the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Tile address within the current grid
    pub address: TileAddress,
    /// Render resolution the image was produced at
    pub resolution_px: u32,
}

impl TileKey {
    /// Creates a new tile key.
    pub fn new(address: TileAddress, resolution_px: u32) -> Self {
        Self {
            address,
            resolution_px,
        }
    }
}

/// Counters and gauges describing cache behaviour.
///
/// Counters accumulate over the cache's lifetime; gauges reflect the state
/// after the most recent operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that missed
    pub misses: u64,
    /// Entries evicted to make room
    pub evictions: u64,
    /// Entries dropped by [`invalidate_all`](super::TileCache::invalidate_all)
    pub invalidations: u64,
    /// Current number of entries
    pub entry_count: usize,
    /// Current total decoded image size in bytes
    pub size_bytes: usize,
}

impl CacheStats {
    /// Hit rate over all lookups so far, 0.0 when no lookups happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_includes_resolution() {
        let address = TileAddress::new(1, 2);
        let preview = TileKey::new(address, 256);
        let analysis = TileKey::new(address, 512);

        assert_ne!(preview, analysis);
        assert_eq!(preview, TileKey::new(address, 256));
    }

    #[test]
    fn test_hit_rate() {
        let mut stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);

        stats.hits = 3;
        stats.misses = 1;
        assert!((stats.hit_rate() - 0.75).abs() < 1e-12);
    }
}
