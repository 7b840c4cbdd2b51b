//! Analysis run status.

/// Lifecycle state of an analysis run.
///
/// Runs move `Idle → Running → {Paused ⇄ Running} → {Completed | Cancelled |
/// Failed}`. `Failed` is reached only when a configuration error prevents
/// any tile from being processed; per-tile failures are recorded as
/// individual results and never fail the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunStatus {
    /// No run has been started.
    #[default]
    Idle,

    /// Workers are processing tiles.
    Running,

    /// Paused: in-flight tiles finish, no new tile starts.
    Paused,

    /// Every requested tile reached an outcome.
    Completed,

    /// Cancelled: completed results are kept, remaining tiles abandoned.
    Cancelled,

    /// A configuration error stopped the run before any tile was processed.
    Failed,
}

impl RunStatus {
    /// Returns true for states the run can never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Returns true while the run is underway (running or paused).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Returns true if the run is paused.
    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
