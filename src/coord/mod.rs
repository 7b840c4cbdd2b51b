//! Coordinate conversion module.
//!
//! Provides pure conversions between layout (world) coordinates, the pixel
//! space of the rendered grid, and tile addresses. All functions are total
//! over valid inputs and fail with a [`GeometryError`] when the grid
//! configuration is structurally invalid or the layout bounds have no area.

mod types;

pub use types::{
    GeometryError, GridConfig, PixelRect, TileAddress, WorldRect, MAX_OVERLAP_PERCENT,
};

/// Validates a grid configuration together with layout bounds.
///
/// Every conversion in this module calls this first; callers that want to
/// reject bad input before starting any work can call it directly.
pub fn validate(grid: &GridConfig, layout_bounds: &WorldRect) -> Result<(), GeometryError> {
    grid.validate()?;
    if layout_bounds.width() <= 0.0 || layout_bounds.height() <= 0.0 {
        return Err(GeometryError::DegenerateBounds {
            width: layout_bounds.width(),
            height: layout_bounds.height(),
        });
    }
    Ok(())
}

/// Returns the nominal (non-overlap-expanded) world rectangle of a tile.
///
/// The nominal rect is the tile's share of the layout: `layout / cols` wide
/// and `layout / rows` tall. Region membership tests use this rect so that
/// overlap never changes which tiles count as inside a selection.
pub fn nominal_world_rect(
    address: TileAddress,
    grid: &GridConfig,
    layout_bounds: &WorldRect,
) -> Result<WorldRect, GeometryError> {
    validate(grid, layout_bounds)?;
    check_address(address, grid)?;

    let step_w = layout_bounds.width() / grid.cols as f64;
    let step_h = layout_bounds.height() / grid.rows as f64;

    Ok(WorldRect::from_origin_size(
        layout_bounds.min_x + address.col as f64 * step_w,
        layout_bounds.min_y + address.row as f64 * step_h,
        step_w,
        step_h,
    ))
}

/// Returns the render rectangle of a tile, including overlap.
///
/// The nominal rect is expanded symmetrically by `overlap_percent / 2` of the
/// nominal step on each side, then clipped to the layout bounds so boundary
/// tiles never sample outside the layout. Overlap gives the classifier
/// context at tile seams.
pub fn address_to_world_rect(
    address: TileAddress,
    grid: &GridConfig,
    layout_bounds: &WorldRect,
) -> Result<WorldRect, GeometryError> {
    let nominal = nominal_world_rect(address, grid, layout_bounds)?;

    let pad_x = nominal.width() * grid.overlap_percent / 100.0 / 2.0;
    let pad_y = nominal.height() * grid.overlap_percent / 100.0 / 2.0;

    let expanded = WorldRect {
        min_x: nominal.min_x - pad_x,
        min_y: nominal.min_y - pad_y,
        max_x: nominal.max_x + pad_x,
        max_y: nominal.max_y + pad_y,
    };

    Ok(expanded.clipped_to(layout_bounds))
}

/// Maps a world rectangle into the pixel space of the rendered grid.
///
/// Pixel space has its origin at the layout's minimum corner and spans
/// `cols * resolution_px` by `rows * resolution_px` pixels.
pub fn world_to_pixel(
    rect: &WorldRect,
    grid: &GridConfig,
    layout_bounds: &WorldRect,
) -> Result<PixelRect, GeometryError> {
    validate(grid, layout_bounds)?;

    let scale_x = (grid.cols * grid.resolution_px) as f64 / layout_bounds.width();
    let scale_y = (grid.rows * grid.resolution_px) as f64 / layout_bounds.height();

    Ok(PixelRect {
        x: (rect.min_x - layout_bounds.min_x) * scale_x,
        y: (rect.min_y - layout_bounds.min_y) * scale_y,
        width: rect.width() * scale_x,
        height: rect.height() * scale_y,
    })
}

/// Maps a pixel rectangle back into world coordinates.
///
/// Inverse of [`world_to_pixel`] up to floating-point tolerance.
pub fn pixel_to_world(
    rect: &PixelRect,
    grid: &GridConfig,
    layout_bounds: &WorldRect,
) -> Result<WorldRect, GeometryError> {
    validate(grid, layout_bounds)?;

    let scale_x = layout_bounds.width() / (grid.cols * grid.resolution_px) as f64;
    let scale_y = layout_bounds.height() / (grid.rows * grid.resolution_px) as f64;

    Ok(WorldRect::from_origin_size(
        layout_bounds.min_x + rect.x * scale_x,
        layout_bounds.min_y + rect.y * scale_y,
        rect.width * scale_x,
        rect.height * scale_y,
    ))
}

/// Returns the address of the tile containing a world point.
///
/// Points outside the layout clamp to the nearest edge tile, matching how
/// a click just outside the canvas selects the border tile.
pub fn address_at(
    x: f64,
    y: f64,
    grid: &GridConfig,
    layout_bounds: &WorldRect,
) -> Result<TileAddress, GeometryError> {
    validate(grid, layout_bounds)?;

    let step_w = layout_bounds.width() / grid.cols as f64;
    let step_h = layout_bounds.height() / grid.rows as f64;

    let col = ((x - layout_bounds.min_x) / step_w).floor();
    let row = ((y - layout_bounds.min_y) / step_h).floor();

    let col = (col.max(0.0) as u32).min(grid.cols - 1);
    let row = (row.max(0.0) as u32).min(grid.rows - 1);

    Ok(TileAddress::new(row, col))
}

fn check_address(address: TileAddress, grid: &GridConfig) -> Result<(), GeometryError> {
    if !grid.contains_address(address) {
        return Err(GeometryError::AddressOutOfRange {
            address,
            rows: grid.rows,
            cols: grid.cols,
        });
    }
    Ok(())
}
