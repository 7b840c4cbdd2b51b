//! Region-of-interest definitions.

use crate::coord::WorldRect;
use serde::{Deserialize, Serialize};

/// A user-selected rectangular region restricting analysis to a tile subset.
///
/// Regions are created by the presentation layer; the core only reads them
/// for membership testing and never mutates their geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiRegion {
    /// Caller-assigned identifier
    pub id: u32,
    /// Region rectangle in world coordinates
    pub rect: WorldRect,
    /// Only selected regions participate in membership tests
    pub selected: bool,
}

impl RoiRegion {
    /// Creates a selected region from two corner points.
    pub fn new(id: u32, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            id,
            rect: WorldRect::from_corners(x1, y1, x2, y2),
            selected: true,
        }
    }

    /// Returns a copy with the selection flag changed.
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}
