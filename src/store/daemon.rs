//! Store daemon: the single consumer of the analysis channel.
//!
//! The daemon owns the [`ResultStore`] and is the only writer. It:
//!
//! 1. Drains messages published by analysis workers and applies them
//! 2. Executes commands issued by the service facade
//! 3. Publishes a fresh snapshot behind a shared handle after every change
//! 4. Re-broadcasts worker messages to push-subscribers
//!
//! Readers access state through the snapshot handle and never block the
//! daemon; the daemon never performs renders or classification calls, so
//! it stays responsive while workers grind through tiles.

use super::results::{ResultStore, StoreError, StoreSnapshot};
use crate::classify::Label;
use crate::coord::{GridConfig, TileAddress, WorldRect};
use crate::grid::RoiRegion;
use crate::messages::AnalysisMessage;
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shared read-only snapshot handle for queries.
pub type SharedStoreState = Arc<RwLock<StoreSnapshot>>;

/// Commands executed by the daemon on behalf of the service facade.
///
/// Commands travel on their own channel so mutation stays single-writer
/// without the facade ever locking the store.
#[derive(Debug)]
pub enum StoreCommand {
    /// Install a new grid, dropping results keyed to the old one.
    ///
    /// Acknowledged once applied so callers can query the new grid
    /// immediately afterwards.
    GenerateGrid {
        grid: GridConfig,
        layout_bounds: WorldRect,
        ack: oneshot::Sender<()>,
    },

    /// Replace the ROI set. Acknowledged once applied.
    SetRois {
        rois: Vec<RoiRegion>,
        ack: oneshot::Sender<()>,
    },

    /// Record the requested address set of a starting run.
    BeginRun { addresses: Vec<TileAddress> },

    /// Override a tile's classification with a reviewer's judgment.
    SetManualClassification {
        address: TileAddress,
        label: Label,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
}

/// The store daemon task.
pub struct StoreDaemon {
    messages: mpsc::UnboundedReceiver<AnalysisMessage>,
    commands: mpsc::UnboundedReceiver<StoreCommand>,
    store: ResultStore,
    shared: SharedStoreState,
    broadcast: broadcast::Sender<AnalysisMessage>,
}

impl StoreDaemon {
    /// Creates a daemon consuming the given message and command channels.
    pub fn new(
        messages: mpsc::UnboundedReceiver<AnalysisMessage>,
        commands: mpsc::UnboundedReceiver<StoreCommand>,
        broadcast_capacity: usize,
    ) -> Self {
        let (broadcast, _) = broadcast::channel(broadcast_capacity);
        Self {
            messages,
            commands,
            store: ResultStore::new(),
            shared: Arc::new(RwLock::new(StoreSnapshot::default())),
            broadcast,
        }
    }

    /// Returns the shared snapshot handle for readers.
    pub fn state_handle(&self) -> SharedStoreState {
        Arc::clone(&self.shared)
    }

    /// Returns the broadcast sender used for push subscriptions.
    ///
    /// Hold on to this before spawning [`run`](Self::run); new receivers
    /// are created from it at any time.
    pub fn broadcast_handle(&self) -> broadcast::Sender<AnalysisMessage> {
        self.broadcast.clone()
    }

    /// Runs the daemon until shutdown is signalled.
    ///
    /// Also exits once both producer channels close: with no senders left,
    /// nothing can change the store anymore.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("store daemon starting");

        let mut commands_open = true;
        let mut messages_open = true;

        while commands_open || messages_open {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => {
                        self.handle_command(command);
                        self.publish_snapshot();
                    }
                    None => commands_open = false,
                },

                message = self.messages.recv(), if messages_open => match message {
                    Some(message) => {
                        self.store.apply(&message);
                        // Forward to push-subscribers; lagging receivers drop
                        // the oldest messages rather than slowing the daemon.
                        let _ = self.broadcast.send(message);
                        self.publish_snapshot();
                    }
                    None => messages_open = false,
                },
            }
        }

        self.publish_snapshot();
        debug!("store daemon stopped");
    }

    fn handle_command(&mut self, command: StoreCommand) {
        match command {
            StoreCommand::GenerateGrid {
                grid,
                layout_bounds,
                ack,
            } => {
                info!(rows = grid.rows, cols = grid.cols, "grid generated");
                self.store.generate_grid(grid, layout_bounds);
                self.publish_snapshot();
                let _ = ack.send(());
            }
            StoreCommand::SetRois { rois, ack } => {
                self.store.set_rois(rois);
                self.publish_snapshot();
                let _ = ack.send(());
            }
            StoreCommand::BeginRun { addresses } => {
                self.store.begin_run(addresses);
            }
            StoreCommand::SetManualClassification {
                address,
                label,
                reply,
            } => {
                let outcome = self.store.set_manual_classification(address, label);
                // Publish before replying so the caller's next query sees
                // the override.
                self.publish_snapshot();
                let _ = reply.send(outcome);
            }
        }
    }

    fn publish_snapshot(&self) {
        if let Ok(mut guard) = self.shared.write() {
            *guard = self.store.snapshot();
        }
    }
}

impl std::fmt::Debug for StoreDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreDaemon")
            .field("results", &self.store.all_results().count())
            .finish_non_exhaustive()
    }
}
