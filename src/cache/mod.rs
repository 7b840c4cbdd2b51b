//! Tile cache.
//!
//! An addressable, bounded store of rendered tile images keyed by tile
//! address and render resolution. Owns the eviction policy (LRU by entry
//! count) and invalidation on grid regeneration.

mod memory;
mod types;

pub use memory::TileCache;
pub use types::{CacheStats, TileKey};
