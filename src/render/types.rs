//! Renderer trait and error types.

use crate::coord::WorldRect;
use image::RgbaImage;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by renderer implementations.
pub type RenderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RgbaImage, RenderError>> + Send + 'a>>;

/// Errors a renderer backend may report.
///
/// Render failures never abort a tile's analysis: the pipeline substitutes
/// a placeholder image and routes the tile to the fallback classifier.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// No backing converter is available for the source layout
    #[error("renderer unavailable: {0}")]
    Unavailable(String),

    /// The backend did not produce an image in time
    #[error("render timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The backend failed while rasterizing
    #[error("render backend error: {0}")]
    Backend(String),
}

/// Trait for tile rasterization backends.
///
/// Given a world-space bounding box and a target resolution, a renderer
/// produces a square raster image of the layout content inside that box.
/// Implementations may call external converters and are expected to be
/// slow for large geometries; the pipeline never invokes them from the
/// message-consumer thread.
pub trait TileRenderer: Send + Sync {
    /// Rasterizes the layout region into a `resolution_px` square image.
    fn render_tile(&self, world_rect: WorldRect, resolution_px: u32) -> RenderFuture<'_>;

    /// Returns the renderer's name for logging and identification.
    fn name(&self) -> &str;
}
