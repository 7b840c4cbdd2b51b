//! Engine configuration and defaults.

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default maximum number of cached tile images.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Default render resolution for analysis tiles.
pub const DEFAULT_ANALYSIS_RESOLUTION: u32 = 512;

/// Default render resolution for preview tiles.
pub const DEFAULT_PREVIEW_RESOLUTION: u32 = 256;

/// Hard cap on the default worker count.
///
/// Classification is network-bound and rate-limited upstream; more workers
/// than this mostly queue on the service.
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Default capacity of the push-subscription broadcast channel.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

// =============================================================================
// Engine Configuration
// =============================================================================

/// Configuration for the inspection engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Maximum number of cached tile images.
    pub cache_capacity: usize,

    /// Render resolution for analysis tiles.
    pub analysis_resolution_px: u32,

    /// Render resolution for preview tiles.
    pub preview_resolution_px: u32,

    /// Worker count used when a run does not specify one.
    pub default_concurrency: usize,

    /// Capacity of the push-subscription broadcast channel.
    pub broadcast_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            analysis_resolution_px: DEFAULT_ANALYSIS_RESOLUTION,
            preview_resolution_px: DEFAULT_PREVIEW_RESOLUTION,
            default_concurrency: default_concurrency(),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

/// Default worker count: `min(available CPUs, 8)`.
pub fn default_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4);
    cpus.min(MAX_DEFAULT_WORKERS).max(1)
}

/// Scales the worker count to the size of the work queue.
///
/// Small batches get fewer workers so a two-tile ROI does not spin up a
/// full pool; large batches use the configured maximum.
pub fn scaled_concurrency(queue_len: usize, max_workers: usize) -> usize {
    let max_workers = max_workers.max(1);
    let scaled = if queue_len < 5 {
        2.min(queue_len.max(1))
    } else if queue_len < 20 {
        4
    } else {
        max_workers
    };
    scaled.min(max_workers)
}
