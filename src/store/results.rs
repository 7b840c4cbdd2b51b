//! Result store state and message application.
//!
//! The store is the exclusive owner of per-tile classification results and
//! run aggregates. It is deliberately a plain single-threaded structure:
//! only the [`StoreDaemon`](super::StoreDaemon) ever holds it, so no locking
//! is needed around its bookkeeping. All mutation goes through named
//! commands or idempotent message application, never direct field writes.

use crate::classify::{Label, ResultSource, TileResult};
use crate::coord::{GridConfig, TileAddress, WorldRect};
use crate::dispatch::RunStatus;
use crate::grid::RoiRegion;
use crate::messages::AnalysisMessage;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Errors from store commands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No grid has been generated yet
    #[error("no grid has been generated")]
    NoGrid,

    /// Address does not belong to the current grid
    #[error("address {0} is outside the current grid")]
    AddressOutOfGrid(TileAddress),

    /// A result references an address outside the current grid
    #[error("result for {0} is inconsistent with the current grid")]
    InconsistentResult(TileAddress),

    /// The store daemon has been shut down
    #[error("store daemon is not running")]
    DaemonStopped,
}

/// Aggregate view of the current analysis run.
///
/// Counts are derived from store state rather than incremented per message,
/// which is what makes message application idempotent. A tile that took a
/// degraded path appears in both `failed` (the recorded error) and
/// `succeeded` (its fallback result).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisRun {
    pub status: RunStatus,
    /// Tiles requested for this run
    pub total: usize,
    /// Tiles that reached an outcome (from absolute progress messages)
    pub completed: usize,
    /// Requested tiles holding a result
    pub succeeded: usize,
    /// Requested tiles with a recorded per-tile error
    pub failed: usize,
    /// Results produced by the model pipeline
    pub model_classified: usize,
    /// Results produced by the fallback heuristic
    pub fallback_classified: usize,
    /// Requested tiles with no result yet, in enumeration order
    pub pending: Vec<TileAddress>,
}

/// Single-owner state for grid, ROIs, results, and run aggregates.
#[derive(Debug, Default, Clone)]
pub struct ResultStore {
    grid: Option<GridConfig>,
    layout_bounds: Option<WorldRect>,
    rois: Vec<RoiRegion>,
    results: BTreeMap<TileAddress, TileResult>,
    errors: BTreeMap<TileAddress, String>,
    requested: Vec<TileAddress>,
    completed: usize,
    total: usize,
    status: RunStatus,
}

impl ResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Message application
    // =========================================================================

    /// Applies a message from the analysis channel.
    ///
    /// Application is idempotent: applying the same message twice leaves the
    /// store in the same state as applying it once.
    pub fn apply(&mut self, message: &AnalysisMessage) {
        match message {
            AnalysisMessage::Progress { completed, total } => {
                self.completed = *completed;
                self.total = *total;
            }
            AnalysisMessage::Result { address, result } => {
                match self.grid {
                    Some(grid) if grid.contains_address(*address) => {
                        self.results.insert(*address, result.clone());
                    }
                    _ => {
                        // A result can race a grid regeneration; accepting it
                        // would break the export consistency guarantee.
                        warn!(address = %address, "dropping result for address outside current grid");
                    }
                }
            }
            AnalysisMessage::Error {
                address,
                kind,
                detail,
            } => {
                self.errors.insert(*address, format!("{kind}: {detail}"));
            }
            AnalysisMessage::StatusChanged { status } => {
                self.status = *status;
            }
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Installs a new grid, clearing every result keyed to the old one.
    ///
    /// The caller validates the configuration and invalidates the tile
    /// cache before issuing this command. ROIs live in world coordinates
    /// and survive regeneration.
    pub fn generate_grid(&mut self, grid: GridConfig, layout_bounds: WorldRect) {
        self.grid = Some(grid);
        self.layout_bounds = Some(layout_bounds);
        self.results.clear();
        self.errors.clear();
        self.requested.clear();
        self.completed = 0;
        self.total = 0;
        self.status = RunStatus::Idle;
    }

    /// Replaces the ROI set.
    pub fn set_rois(&mut self, rois: Vec<RoiRegion>) {
        self.rois = rois;
    }

    /// Records the address set of a newly started run.
    ///
    /// Prior results survive; re-analysis overwrites per address as fresh
    /// results arrive.
    pub fn begin_run(&mut self, addresses: Vec<TileAddress>) {
        self.total = addresses.len();
        self.completed = 0;
        self.errors.clear();
        self.requested = addresses;
    }

    /// Overrides a tile's classification with a reviewer's judgment.
    ///
    /// The model's rationale is kept when one exists so the reviewer's
    /// label stays auditable against the original analysis.
    pub fn set_manual_classification(
        &mut self,
        address: TileAddress,
        label: Label,
    ) -> Result<(), StoreError> {
        let grid = self.grid.ok_or(StoreError::NoGrid)?;
        if !grid.contains_address(address) {
            return Err(StoreError::AddressOutOfGrid(address));
        }

        let rationale = match self.results.get(&address) {
            Some(previous) => previous.rationale.clone(),
            None => "manually classified without prior analysis".to_string(),
        };
        self.results
            .insert(address, TileResult::manual(address, label, rationale));
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current grid configuration, if one was generated.
    pub fn grid(&self) -> Option<GridConfig> {
        self.grid
    }

    /// Layout bounds the grid was generated over.
    pub fn layout_bounds(&self) -> Option<WorldRect> {
        self.layout_bounds
    }

    /// Registered ROI set.
    pub fn rois(&self) -> &[RoiRegion] {
        &self.rois
    }

    /// Result for one address, if analyzed.
    pub fn result(&self, address: TileAddress) -> Option<&TileResult> {
        self.results.get(&address)
    }

    /// All results in row-major address order.
    pub fn all_results(&self) -> impl Iterator<Item = (&TileAddress, &TileResult)> {
        self.results.iter()
    }

    /// Addresses flagged for reviewer attention (discontinuities).
    pub fn flagged_addresses(&self) -> Vec<TileAddress> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_flagged())
            .map(|(address, _)| *address)
            .collect()
    }

    /// Computes the current run aggregate.
    pub fn run(&self) -> AnalysisRun {
        let succeeded = self
            .requested
            .iter()
            .filter(|a| self.results.contains_key(*a))
            .count();
        let failed = self
            .requested
            .iter()
            .filter(|a| self.errors.contains_key(*a))
            .count();
        let pending: Vec<TileAddress> = self
            .requested
            .iter()
            .filter(|a| !self.results.contains_key(*a))
            .copied()
            .collect();

        let model_classified = self.count_source(ResultSource::Model);
        let fallback_classified = self.count_source(ResultSource::Fallback);

        AnalysisRun {
            status: self.status,
            total: self.total,
            completed: self.completed,
            succeeded,
            failed,
            model_classified,
            fallback_classified,
            pending,
        }
    }

    /// Produces a read-only snapshot for concurrent readers.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            grid: self.grid,
            layout_bounds: self.layout_bounds,
            rois: self.rois.clone(),
            results: self.results.clone(),
            run: self.run(),
        }
    }

    fn count_source(&self, source: ResultSource) -> usize {
        self.results
            .values()
            .filter(|r| r.source == source)
            .count()
    }
}

/// Immutable snapshot of store state published by the daemon.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub grid: Option<GridConfig>,
    pub layout_bounds: Option<WorldRect>,
    pub rois: Vec<RoiRegion>,
    /// Results in row-major address order
    pub results: BTreeMap<TileAddress, TileResult>,
    pub run: AnalysisRun,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FastClassification;
    use crate::messages::TileErrorKind;

    fn bounds_100() -> WorldRect {
        WorldRect::from_corners(0.0, 0.0, 100.0, 100.0)
    }

    fn store_with_grid(rows: u32, cols: u32) -> ResultStore {
        let mut store = ResultStore::new();
        store.generate_grid(GridConfig::new(rows, cols, 0.0, 256), bounds_100());
        store
    }

    fn model_result(address: TileAddress, label: Label) -> TileResult {
        TileResult::model(address, label, 0.9, "analysis text".to_string())
    }

    #[test]
    fn test_apply_result_stores_by_address() {
        let mut store = store_with_grid(2, 2);
        let address = TileAddress::new(0, 1);

        store.apply(&AnalysisMessage::Result {
            address,
            result: model_result(address, Label::Continuity),
        });

        assert_eq!(store.result(address).unwrap().label, Label::Continuity);
    }

    #[test]
    fn test_apply_result_twice_is_idempotent() {
        let mut store = store_with_grid(2, 2);
        store.begin_run(vec![TileAddress::new(0, 0)]);
        let address = TileAddress::new(0, 0);
        let message = AnalysisMessage::Result {
            address,
            result: model_result(address, Label::Discontinuity),
        };

        store.apply(&message);
        let once = store.snapshot();
        store.apply(&message);
        let twice = store.snapshot();

        assert_eq!(once.results, twice.results);
        assert_eq!(once.run, twice.run);
    }

    #[test]
    fn test_apply_result_last_write_wins() {
        let mut store = store_with_grid(2, 2);
        let address = TileAddress::new(1, 1);

        store.apply(&AnalysisMessage::Result {
            address,
            result: model_result(address, Label::Continuity),
        });
        store.apply(&AnalysisMessage::Result {
            address,
            result: model_result(address, Label::Discontinuity),
        });

        assert_eq!(store.result(address).unwrap().label, Label::Discontinuity);
        assert_eq!(store.all_results().count(), 1);
    }

    #[test]
    fn test_apply_result_outside_grid_is_dropped() {
        let mut store = store_with_grid(2, 2);
        let outside = TileAddress::new(9, 9);

        store.apply(&AnalysisMessage::Result {
            address: outside,
            result: model_result(outside, Label::Continuity),
        });

        assert!(store.result(outside).is_none());
    }

    #[test]
    fn test_apply_result_without_grid_is_dropped() {
        let mut store = ResultStore::new();
        let address = TileAddress::new(0, 0);

        store.apply(&AnalysisMessage::Result {
            address,
            result: model_result(address, Label::Continuity),
        });

        assert!(store.result(address).is_none());
    }

    #[test]
    fn test_apply_progress_is_absolute() {
        let mut store = store_with_grid(2, 2);
        store.apply(&AnalysisMessage::Progress {
            completed: 2,
            total: 4,
        });
        store.apply(&AnalysisMessage::Progress {
            completed: 2,
            total: 4,
        });

        let run = store.run();
        assert_eq!(run.completed, 2);
        assert_eq!(run.total, 4);
    }

    #[test]
    fn test_apply_status_changed() {
        let mut store = store_with_grid(1, 1);
        store.apply(&AnalysisMessage::StatusChanged {
            status: RunStatus::Running,
        });
        assert_eq!(store.run().status, RunStatus::Running);

        store.apply(&AnalysisMessage::StatusChanged {
            status: RunStatus::Cancelled,
        });
        assert_eq!(store.run().status, RunStatus::Cancelled);
    }

    #[test]
    fn test_run_aggregate_counts() {
        let mut store = store_with_grid(2, 2);
        let addresses: Vec<TileAddress> = vec![
            TileAddress::new(0, 0),
            TileAddress::new(0, 1),
            TileAddress::new(1, 0),
        ];
        store.begin_run(addresses.clone());

        store.apply(&AnalysisMessage::Result {
            address: addresses[0],
            result: model_result(addresses[0], Label::Continuity),
        });
        store.apply(&AnalysisMessage::Error {
            address: addresses[1],
            kind: TileErrorKind::Render,
            detail: "backend down".to_string(),
        });
        store.apply(&AnalysisMessage::Result {
            address: addresses[1],
            result: TileResult::fallback(
                addresses[1],
                FastClassification {
                    label: Label::NoWaveguide,
                    confidence: 0.25,
                },
                "render failed".to_string(),
            ),
        });
        store.apply(&AnalysisMessage::Progress {
            completed: 2,
            total: 3,
        });

        let run = store.run();
        assert_eq!(run.total, 3);
        assert_eq!(run.completed, 2);
        assert_eq!(run.succeeded, 2);
        assert_eq!(run.failed, 1);
        assert_eq!(run.model_classified, 1);
        assert_eq!(run.fallback_classified, 1);
        assert_eq!(run.pending, vec![addresses[2]]);
    }

    #[test]
    fn test_generate_grid_clears_results() {
        let mut store = store_with_grid(2, 2);
        let address = TileAddress::new(0, 0);
        store.apply(&AnalysisMessage::Result {
            address,
            result: model_result(address, Label::Discontinuity),
        });
        assert!(store.result(address).is_some());

        store.generate_grid(GridConfig::new(3, 3, 5.0, 512), bounds_100());

        assert!(store.result(address).is_none());
        assert_eq!(store.run().status, RunStatus::Idle);
        assert_eq!(store.grid().unwrap().rows, 3);
    }

    #[test]
    fn test_rois_survive_grid_regeneration() {
        let mut store = store_with_grid(2, 2);
        store.set_rois(vec![RoiRegion::new(1, 0.0, 0.0, 10.0, 10.0)]);

        store.generate_grid(GridConfig::new(4, 4, 0.0, 256), bounds_100());

        assert_eq!(store.rois().len(), 1);
    }

    #[test]
    fn test_manual_classification_overrides() {
        let mut store = store_with_grid(2, 2);
        let address = TileAddress::new(1, 0);
        store.apply(&AnalysisMessage::Result {
            address,
            result: model_result(address, Label::Discontinuity),
        });

        store
            .set_manual_classification(address, Label::Continuity)
            .unwrap();

        let result = store.result(address).unwrap();
        assert_eq!(result.label, Label::Continuity);
        assert_eq!(result.source, ResultSource::Manual);
        assert!(result.reviewed_by_user);
        // Prior rationale stays auditable.
        assert_eq!(result.rationale, "analysis text");
    }

    #[test]
    fn test_manual_classification_requires_grid() {
        let mut store = ResultStore::new();
        let result = store.set_manual_classification(TileAddress::new(0, 0), Label::Continuity);
        assert_eq!(result, Err(StoreError::NoGrid));
    }

    #[test]
    fn test_manual_classification_rejects_outside_address() {
        let mut store = store_with_grid(2, 2);
        let outside = TileAddress::new(5, 5);
        let result = store.set_manual_classification(outside, Label::Continuity);
        assert_eq!(result, Err(StoreError::AddressOutOfGrid(outside)));
    }

    #[test]
    fn test_flagged_addresses() {
        let mut store = store_with_grid(2, 2);
        let flagged = TileAddress::new(0, 1);
        let clean = TileAddress::new(0, 0);

        store.apply(&AnalysisMessage::Result {
            address: clean,
            result: model_result(clean, Label::Continuity),
        });
        store.apply(&AnalysisMessage::Result {
            address: flagged,
            result: model_result(flagged, Label::Discontinuity),
        });

        assert_eq!(store.flagged_addresses(), vec![flagged]);
    }

    #[test]
    fn test_all_results_row_major_order() {
        let mut store = store_with_grid(2, 2);
        let later = TileAddress::new(1, 1);
        let earlier = TileAddress::new(0, 1);

        store.apply(&AnalysisMessage::Result {
            address: later,
            result: model_result(later, Label::Continuity),
        });
        store.apply(&AnalysisMessage::Result {
            address: earlier,
            result: model_result(earlier, Label::Continuity),
        });

        let order: Vec<TileAddress> = store.all_results().map(|(a, _)| *a).collect();
        assert_eq!(order, vec![earlier, later]);
    }
}
