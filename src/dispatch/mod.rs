//! Analysis dispatcher.
//!
//! A concurrency-controlled pipeline that pulls tile addresses from a
//! bounded work queue, renders them (cache-or-generate), submits the images
//! to the classification collaborators, and publishes results on the
//! message channel. Supports pause/resume/cancel and bounded parallelism.

mod dispatcher;
mod handle;
mod processor;
mod status;

pub use dispatcher::{AnalysisDispatcher, RunError};
pub use handle::RunHandle;
pub use status::RunStatus;
