//! Magenta placeholder texture for failed renders.
//!
//! When every renderer in the chain fails, the pipeline substitutes a solid
//! magenta (255, 0, 255) image so the tile still flows through analysis and
//! shows up as a clearly visible error indicator for reviewers.

use image::{Rgba, RgbaImage};

/// Placeholder fill colour (magenta, fully opaque).
pub const PLACEHOLDER_PIXEL: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Generates a solid magenta placeholder image of the given resolution.
pub fn placeholder_image(resolution_px: u32) -> RgbaImage {
    RgbaImage::from_pixel(resolution_px, resolution_px, PLACEHOLDER_PIXEL)
}
