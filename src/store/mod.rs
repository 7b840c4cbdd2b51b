//! Result store and state management.
//!
//! Process-wide, thread-confined state: grid configuration, ROI
//! registrations, per-tile classification results, and run aggregates. All
//! mutation flows through the single-owner [`StoreDaemon`]; readers work
//! from published snapshots and push subscriptions.

mod daemon;
mod export;
mod results;

pub use daemon::{SharedStoreState, StoreCommand, StoreDaemon};
pub use export::ExportRecord;
pub use results::{AnalysisRun, ResultStore, StoreError, StoreSnapshot};
