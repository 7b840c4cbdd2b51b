//! Tile rendering collaborator boundary.
//!
//! The core does not rasterize layouts itself. Backends implement
//! [`TileRenderer`]; the pipeline walks an ordered [`RendererChain`] and
//! falls back to a magenta placeholder when every backend fails, so a tile
//! always has an image to classify.

mod chain;
mod placeholder;
mod types;

pub use chain::{RenderedTile, RendererChain};
pub use placeholder::{placeholder_image, PLACEHOLDER_PIXEL};
pub use types::{RenderError, RenderFuture, TileRenderer};
