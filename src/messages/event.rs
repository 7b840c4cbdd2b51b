//! Message types for the analysis channel.
//!
//! Messages are the sole path by which background workers affect shared
//! state: workers publish, the store daemon consumes and applies. Each
//! message is self-contained and safe to apply more than once; writes are
//! absolute, never additive.

use crate::classify::TileResult;
use crate::coord::TileAddress;
use crate::dispatch::RunStatus;

/// Category of a recoverable per-tile failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileErrorKind {
    /// Every renderer backend failed; a placeholder was substituted
    Render,
    /// The classification service failed; the fallback heuristic ran
    Classification,
    /// Unexpected internal failure (bad geometry mid-run)
    Internal,
}

impl std::fmt::Display for TileErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render => write!(f, "render"),
            Self::Classification => write!(f, "classification"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Messages published by analysis workers and the run supervisor.
#[derive(Clone, Debug)]
pub enum AnalysisMessage {
    /// Absolute progress of the current run.
    Progress {
        /// Tiles that reached an outcome so far
        completed: usize,
        /// Tiles requested for this run
        total: usize,
    },

    /// A tile finished analysis (model, fallback, or placeholder path).
    Result {
        address: TileAddress,
        result: TileResult,
    },

    /// A recoverable per-tile failure. The tile still receives a Result;
    /// this message records why it took a degraded path.
    Error {
        address: TileAddress,
        kind: TileErrorKind,
        detail: String,
    },

    /// The run moved to a new lifecycle state.
    StatusChanged { status: RunStatus },
}

impl AnalysisMessage {
    /// Returns a short name for this message type (useful for debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
            Self::StatusChanged { .. } => "status_changed",
        }
    }
}
