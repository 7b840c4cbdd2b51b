//! Classification collaborator boundary.
//!
//! The classification service is external: a detailed model produces a
//! free-text rationale and a fast model produces the discrete three-way
//! label. Both may be slow, rate-limited, or unavailable; every failure
//! routes to the deterministic local [`FallbackClassifier`].

mod fallback;
mod types;

pub use fallback::{FallbackClassifier, DEFAULT_COVERAGE_THRESHOLD};
pub use types::{
    ClassifyError, ClassifyFuture, DetailedClassifier, FastClassification, FastClassifier, Label,
    ResultSource, TileResult,
};
