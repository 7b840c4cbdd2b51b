//! High-level inspection service facade.
//!
//! Wires the tile cache, renderer chain, classifiers, store daemon, and
//! dispatcher into the command/query surface the presentation layer and
//! exporter consume. Must be created inside a Tokio runtime: construction
//! spawns the store daemon task.
//!
//! # Example
//!
//! ```ignore
//! use picverify::service::InspectionService;
//!
//! let service = InspectionService::new(config, renderers, detailed, fast);
//! service.generate_grid(grid, layout_bounds).await?;
//!
//! let handle = service.start_run(service.all_addresses()?, None)?;
//! handle.wait().await;
//!
//! let record = service.export_record()?;
//! ```

use crate::cache::{CacheStats, TileCache};
use crate::classify::{
    DetailedClassifier, FallbackClassifier, FastClassifier, Label, TileResult,
};
use crate::config::{self, EngineConfig};
use crate::coord::{self, GeometryError, GridConfig, TileAddress, WorldRect};
use crate::dispatch::{AnalysisDispatcher, RunError, RunHandle};
use crate::grid::{self, RoiRegion};
use crate::messages::{AnalysisMessage, MessageClient};
use crate::render::RendererChain;
use crate::store::{
    AnalysisRun, ExportRecord, SharedStoreState, StoreCommand, StoreDaemon, StoreError,
    StoreSnapshot,
};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Facade over the virtual tile subsystem.
///
/// Thread-safe: the internal handles are cheap to clone and all mutation is
/// routed through the store daemon or the active run's control state.
pub struct InspectionService {
    config: EngineConfig,
    cache: Arc<TileCache>,
    renderers: Arc<RendererChain>,
    detailed: Arc<dyn DetailedClassifier>,
    fast: Arc<dyn FastClassifier>,
    fallback: FallbackClassifier,
    client: MessageClient,
    command_tx: mpsc::UnboundedSender<StoreCommand>,
    shared: SharedStoreState,
    broadcast: broadcast::Sender<AnalysisMessage>,
    shutdown: CancellationToken,
    current_run: Mutex<Option<RunHandle>>,
}

impl InspectionService {
    /// Creates the service and spawns its store daemon.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(
        config: EngineConfig,
        renderers: RendererChain,
        detailed: Arc<dyn DetailedClassifier>,
        fast: Arc<dyn FastClassifier>,
    ) -> Self {
        let (client, message_rx) = MessageClient::channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let daemon = StoreDaemon::new(message_rx, command_rx, config.broadcast_capacity);
        let shared = daemon.state_handle();
        let broadcast = daemon.broadcast_handle();

        let shutdown = CancellationToken::new();
        tokio::spawn(daemon.run(shutdown.clone()));

        info!(
            cache_capacity = config.cache_capacity,
            resolution = config.analysis_resolution_px,
            "inspection service started"
        );

        Self {
            cache: Arc::new(TileCache::new(config.cache_capacity)),
            renderers: Arc::new(renderers),
            detailed,
            fast,
            fallback: FallbackClassifier::new(),
            client,
            command_tx,
            shared,
            broadcast,
            shutdown,
            current_run: Mutex::new(None),
            config,
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Generates a new grid over the given layout bounds.
    ///
    /// Rejects structurally invalid configurations before any work starts.
    /// A new grid invalidates every cached tile image and drops results
    /// keyed to the previous grid. Returns once the store has applied the
    /// new grid, so queries issued afterwards observe it.
    pub async fn generate_grid(
        &self,
        grid: GridConfig,
        layout_bounds: WorldRect,
    ) -> Result<(), GeometryError> {
        coord::validate(&grid, &layout_bounds)?;

        self.cache.invalidate_all();
        let (ack_tx, ack_rx) = oneshot::channel();
        let send = self.command_tx.send(StoreCommand::GenerateGrid {
            grid,
            layout_bounds,
            ack: ack_tx,
        });
        if send.is_ok() {
            let _ = ack_rx.await;
        }
        Ok(())
    }

    /// Replaces the registered ROI set, returning once the store applied it.
    pub async fn set_rois(&self, rois: Vec<RoiRegion>) {
        let (ack_tx, ack_rx) = oneshot::channel();
        let send = self
            .command_tx
            .send(StoreCommand::SetRois { rois, ack: ack_tx });
        if send.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Starts analyzing the given addresses.
    ///
    /// With `concurrency` of `None` the worker count scales to the batch
    /// size. Only one run may be active at a time; pausing does not release
    /// the slot, cancellation or completion does.
    pub fn start_run(
        &self,
        addresses: Vec<TileAddress>,
        concurrency: Option<usize>,
    ) -> Result<RunHandle, RunError> {
        let snapshot = self.snapshot();
        let grid = snapshot.grid.ok_or(RunError::NoGrid)?;
        let layout_bounds = snapshot.layout_bounds.ok_or(RunError::NoGrid)?;

        let mut current = self.current_run.lock().unwrap();
        if let Some(existing) = current.as_ref() {
            if existing.status().is_active() {
                return Err(RunError::AlreadyRunning);
            }
        }

        let workers = concurrency.unwrap_or_else(|| {
            config::scaled_concurrency(addresses.len(), self.config.default_concurrency)
        });

        let _ = self.command_tx.send(StoreCommand::BeginRun {
            addresses: addresses.clone(),
        });

        let dispatcher = AnalysisDispatcher::new(
            grid,
            layout_bounds,
            Arc::clone(&self.cache),
            Arc::clone(&self.renderers),
            Arc::clone(&self.detailed),
            Arc::clone(&self.fast),
            self.fallback.clone(),
            self.client.clone(),
        );
        let handle = dispatcher.start(addresses, workers)?;

        *current = Some(handle.clone());
        Ok(handle)
    }

    /// Pauses the active run, if any.
    pub fn pause(&self) {
        if let Some(handle) = self.current_run.lock().unwrap().as_ref() {
            handle.pause();
        }
    }

    /// Resumes the active run, if any.
    pub fn resume(&self) {
        if let Some(handle) = self.current_run.lock().unwrap().as_ref() {
            handle.resume();
        }
    }

    /// Cancels the active run, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.current_run.lock().unwrap().as_ref() {
            handle.cancel();
        }
    }

    /// Overrides a tile's classification with a reviewer's judgment.
    pub async fn set_manual_classification(
        &self,
        address: TileAddress,
        label: Label,
    ) -> Result<(), StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(StoreCommand::SetManualClassification {
                address,
                label,
                reply: reply_tx,
            })
            .map_err(|_| StoreError::DaemonStopped)?;
        reply_rx.await.map_err(|_| StoreError::DaemonStopped)?
    }

    /// Stops the store daemon. Queries keep answering from the last
    /// published snapshot.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Subscribes to the push message stream.
    ///
    /// Receivers that fall behind drop the oldest messages rather than
    /// slowing the pipeline down.
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisMessage> {
        self.broadcast.subscribe()
    }

    /// Every address of the current grid in row-major order.
    pub fn all_addresses(&self) -> Result<Vec<TileAddress>, RunError> {
        let grid = self.snapshot().grid.ok_or(RunError::NoGrid)?;
        Ok(grid::all_addresses(&grid).collect())
    }

    /// Addresses whose nominal rect intersects a selected ROI.
    pub fn roi_addresses(&self) -> Result<Vec<TileAddress>, RunError> {
        let snapshot = self.snapshot();
        let grid = snapshot.grid.ok_or(RunError::NoGrid)?;
        let layout_bounds = snapshot.layout_bounds.ok_or(RunError::NoGrid)?;
        Ok(grid::addresses_intersecting(
            &grid,
            &layout_bounds,
            &snapshot.rois,
        )?)
    }

    /// Result for one address, if analyzed.
    pub fn result(&self, address: TileAddress) -> Option<TileResult> {
        self.snapshot().results.get(&address).cloned()
    }

    /// All results in row-major address order.
    pub fn all_results(&self) -> Vec<(TileAddress, TileResult)> {
        self.snapshot()
            .results
            .iter()
            .map(|(address, result)| (*address, result.clone()))
            .collect()
    }

    /// Addresses flagged for reviewer attention.
    pub fn flagged_addresses(&self) -> Vec<TileAddress> {
        self.snapshot()
            .results
            .iter()
            .filter(|(_, result)| result.is_flagged())
            .map(|(address, _)| *address)
            .collect()
    }

    /// Aggregate view of the current run.
    pub fn run(&self) -> AnalysisRun {
        self.snapshot().run
    }

    /// Tile cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Assembles the export record for the exporter collaborator.
    pub fn export_record(&self) -> Result<ExportRecord, StoreError> {
        ExportRecord::from_snapshot(&self.snapshot())
    }

    fn snapshot(&self) -> StoreSnapshot {
        self.shared.read().unwrap().clone()
    }
}

impl Drop for InspectionService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for InspectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectionService")
            .field("cache", &self.cache)
            .field("renderers", &self.renderers)
            .finish_non_exhaustive()
    }
}
