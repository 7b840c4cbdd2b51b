//! Export record assembly.
//!
//! The on-disk schema belongs to the exporter collaborator; the core only
//! guarantees that the in-memory record is complete and internally
//! consistent. Serialization uses serde so exporters can emit JSON or any
//! other serde-backed format without touching this crate.

use super::results::{StoreError, StoreSnapshot};
use crate::classify::TileResult;
use crate::coord::{GridConfig, WorldRect};
use crate::grid::RoiRegion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete, consistent record of an inspection session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// When the record was assembled (UTC)
    pub exported_at: DateTime<Utc>,
    pub grid: GridConfig,
    pub layout_bounds: WorldRect,
    pub rois: Vec<RoiRegion>,
    /// Every tile result, in row-major address order
    pub results: Vec<TileResult>,
}

impl ExportRecord {
    /// Assembles an export record from a store snapshot.
    ///
    /// Fails when no grid has been generated or when any result references
    /// an address outside the current grid. The store drops such results on
    /// arrival, so the check guards against construction from a snapshot
    /// that was never routed through the store.
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> Result<Self, StoreError> {
        let grid = snapshot.grid.ok_or(StoreError::NoGrid)?;
        let layout_bounds = snapshot.layout_bounds.ok_or(StoreError::NoGrid)?;

        for address in snapshot.results.keys() {
            if !grid.contains_address(*address) {
                return Err(StoreError::InconsistentResult(*address));
            }
        }

        Ok(Self {
            exported_at: Utc::now(),
            grid,
            layout_bounds,
            rois: snapshot.rois.clone(),
            results: snapshot.results.values().cloned().collect(),
        })
    }

    /// Number of results flagged for reviewer attention.
    pub fn flagged_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_flagged()).count()
    }
}
