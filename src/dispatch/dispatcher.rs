//! Analysis dispatcher: bounded worker pool over a shared address queue.
//!
//! The dispatcher spawns up to `concurrency` workers that pull addresses
//! from a shared FIFO queue. Workers cooperate with the run's control
//! state: a paused run blocks them before the next dequeue, a cancelled
//! run makes them abandon the queue while in-flight tiles finish.

use super::handle::{RunControl, RunHandle};
use super::processor::{process_tile, WorkerContext};
use super::status::RunStatus;
use crate::cache::TileCache;
use crate::classify::{DetailedClassifier, FallbackClassifier, FastClassifier};
use crate::coord::{self, GeometryError, GridConfig, TileAddress, WorldRect};
use crate::messages::MessageClient;
use crate::render::RendererChain;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that prevent a run from starting.
///
/// These are the only failures that surface as `Failed`: once tiles are
/// being processed, failures degrade individual tiles instead.
#[derive(Debug, Error)]
pub enum RunError {
    /// No renderer backend is configured; there is nothing to classify
    #[error("no tile renderer is configured")]
    NoRenderer,

    /// Grid or layout bounds are structurally invalid
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// A run is already active; cancel or wait before starting another
    #[error("an analysis run is already active")]
    AlreadyRunning,

    /// No grid has been generated yet
    #[error("no grid has been generated")]
    NoGrid,
}

/// Concurrency-controlled analysis pipeline for one grid.
pub struct AnalysisDispatcher {
    context: Arc<WorkerContext>,
}

impl AnalysisDispatcher {
    /// Creates a dispatcher bound to a grid and its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grid: GridConfig,
        layout_bounds: WorldRect,
        cache: Arc<TileCache>,
        renderers: Arc<RendererChain>,
        detailed: Arc<dyn DetailedClassifier>,
        fast: Arc<dyn FastClassifier>,
        fallback: FallbackClassifier,
        client: MessageClient,
    ) -> Self {
        Self {
            context: Arc::new(WorkerContext {
                grid,
                layout_bounds,
                cache,
                renderers,
                detailed,
                fast,
                fallback,
                client,
            }),
        }
    }

    /// Starts analyzing the given addresses with up to `concurrency` workers.
    ///
    /// Returns a [`RunHandle`] for pause/resume/cancel control. Fails
    /// before processing any tile when the configuration cannot support a
    /// run, publishing a `Failed` status so observers see the outcome.
    pub fn start(
        &self,
        addresses: Vec<TileAddress>,
        concurrency: usize,
    ) -> Result<RunHandle, RunError> {
        let ctx = &self.context;

        if let Err(err) = coord::validate(&ctx.grid, &ctx.layout_bounds) {
            ctx.client.status_changed(RunStatus::Failed);
            return Err(err.into());
        }
        if ctx.renderers.is_empty() {
            ctx.client.status_changed(RunStatus::Failed);
            return Err(RunError::NoRenderer);
        }

        let total = addresses.len();
        let workers = concurrency.max(1).min(total.max(1));
        info!(total, workers, "starting analysis run");

        let control = RunControl::new(ctx.client.clone());
        control.transition(RunStatus::Running, |s| s == RunStatus::Idle);

        let queue = Arc::new(Mutex::new(VecDeque::from(addresses)));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut worker_tasks = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            worker_tasks.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&self.context),
                Arc::clone(&control),
                Arc::clone(&queue),
                Arc::clone(&completed),
                total,
            )));
        }

        // Supervisor: once every worker returns, the run is complete unless
        // a cancel already claimed the terminal state.
        let supervisor_control = Arc::clone(&control);
        tokio::spawn(async move {
            for task in worker_tasks {
                let _ = task.await;
            }
            supervisor_control.transition(RunStatus::Completed, |s| !s.is_terminal());
            debug!("analysis run finished");
        });

        Ok(RunHandle::new(control))
    }
}

impl std::fmt::Debug for AnalysisDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisDispatcher")
            .field("grid", &self.context.grid)
            .finish_non_exhaustive()
    }
}

/// Worker: dequeue, process, publish, repeat.
async fn worker_loop(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    control: Arc<RunControl>,
    queue: Arc<Mutex<VecDeque<TileAddress>>>,
    completed: Arc<AtomicUsize>,
    total: usize,
) {
    loop {
        // The gate blocks while paused and returns false once cancelled;
        // checking before the dequeue keeps in-flight work uninterrupted.
        if !control.wait_until_runnable().await {
            debug!(worker_id, "worker exiting: run cancelled");
            return;
        }

        let next = queue.lock().unwrap().pop_front();
        let Some(address) = next else {
            debug!(worker_id, "worker exiting: queue drained");
            return;
        };

        let result = process_tile(&ctx, address).await;
        ctx.client.result(address, result);

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.client.progress(done, total);
    }
}
