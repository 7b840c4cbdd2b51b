//! Ordered renderer fallback chain.
//!
//! Renderers are tried in sequence until one produces an image. The chain is
//! data rather than nested conditionals: callers build it once from whatever
//! backends are available and the pipeline walks it per tile.

use super::placeholder::placeholder_image;
use super::types::{RenderError, TileRenderer};
use crate::coord::WorldRect;
use image::RgbaImage;
use std::sync::Arc;
use tracing::warn;

/// Outcome of walking the renderer chain for one tile.
#[derive(Debug)]
pub enum RenderedTile {
    /// A backend produced a real image.
    Rendered {
        image: RgbaImage,
        /// Name of the backend that succeeded
        renderer: String,
    },
    /// Every backend failed; a placeholder was substituted.
    Placeholder {
        image: RgbaImage,
        /// Description of the last backend failure
        detail: String,
    },
}

impl RenderedTile {
    /// Returns true if this is a substituted placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, RenderedTile::Placeholder { .. })
    }

    /// Consumes the outcome, returning the image either way.
    pub fn into_image(self) -> RgbaImage {
        match self {
            RenderedTile::Rendered { image, .. } => image,
            RenderedTile::Placeholder { image, .. } => image,
        }
    }
}

/// Ordered sequence of renderer backends tried per tile.
#[derive(Clone)]
pub struct RendererChain {
    renderers: Vec<Arc<dyn TileRenderer>>,
}

impl RendererChain {
    /// Creates a chain from an ordered list of backends.
    pub fn new(renderers: Vec<Arc<dyn TileRenderer>>) -> Self {
        Self { renderers }
    }

    /// Creates an empty chain (no backends configured).
    pub fn empty() -> Self {
        Self {
            renderers: Vec::new(),
        }
    }

    /// Appends a backend to the end of the chain.
    pub fn push(&mut self, renderer: Arc<dyn TileRenderer>) {
        self.renderers.push(renderer);
    }

    /// Returns true when no backend is configured.
    ///
    /// A run started against an empty chain fails before processing any
    /// tile; there is nothing to classify without images.
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Number of configured backends.
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    /// Renders a tile, walking the chain until a backend succeeds.
    ///
    /// If every backend fails the result is a magenta placeholder carrying
    /// the last error's description.
    pub async fn render(&self, world_rect: WorldRect, resolution_px: u32) -> RenderedTile {
        let mut last_error: Option<RenderError> = None;

        for renderer in &self.renderers {
            match renderer.render_tile(world_rect, resolution_px).await {
                Ok(image) => {
                    return RenderedTile::Rendered {
                        image,
                        renderer: renderer.name().to_string(),
                    };
                }
                Err(err) => {
                    warn!(renderer = renderer.name(), error = %err, "renderer failed, trying next");
                    last_error = Some(err);
                }
            }
        }

        let detail = match last_error {
            Some(err) => err.to_string(),
            None => "no renderer configured".to_string(),
        };
        RenderedTile::Placeholder {
            image: placeholder_image(resolution_px),
            detail,
        }
    }
}

impl std::fmt::Debug for RendererChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.renderers.iter().map(|r| r.name()).collect();
        f.debug_struct("RendererChain")
            .field("renderers", &names)
            .finish()
    }
}
