//! Run handle for status queries and control.
//!
//! A [`RunHandle`] is returned when an analysis run starts. It is cloneable;
//! all clones control the same run.
//!
//! # Example
//!
//! ```ignore
//! let handle = dispatcher.start(addresses, 4)?;
//!
//! handle.pause();
//! handle.resume();
//!
//! let final_status = handle.wait().await;
//! ```

use super::status::RunStatus;
use crate::messages::MessageClient;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Shared control state for one analysis run.
///
/// Status transitions are serialized through the watch sender; every
/// successful transition is also published on the message channel so the
/// store observes the same lifecycle as local subscribers.
pub(crate) struct RunControl {
    status: watch::Sender<RunStatus>,
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
    client: MessageClient,
}

impl RunControl {
    pub(crate) fn new(client: MessageClient) -> Arc<Self> {
        let (status, _) = watch::channel(RunStatus::Idle);
        let (paused, _) = watch::channel(false);
        Arc::new(Self {
            status,
            paused,
            cancel: CancellationToken::new(),
            client,
        })
    }

    /// Attempts a status transition, publishing it when it takes effect.
    pub(crate) fn transition(
        &self,
        to: RunStatus,
        allowed: impl Fn(RunStatus) -> bool,
    ) -> bool {
        let mut changed = false;
        self.status.send_if_modified(|current| {
            if *current != to && allowed(*current) {
                *current = to;
                changed = true;
                true
            } else {
                false
            }
        });
        if changed {
            self.client.status_changed(to);
        }
        changed
    }

    pub(crate) fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    pub(crate) fn subscribe_status(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Blocks the caller while the run is paused.
    ///
    /// Returns `true` when the caller may dequeue the next tile and `false`
    /// when the run was cancelled, including cancellation that arrives
    /// mid-pause.
    pub(crate) async fn wait_until_runnable(&self) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let mut paused = self.paused.subscribe();
            if !*paused.borrow_and_update() {
                return true;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                changed = paused.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn set_paused(&self, value: bool) {
        let _ = self.paused.send(value);
    }
}

/// Handle to a running analysis for control and status queries.
///
/// Pausing is cooperative: workers finish their in-flight tile and then
/// block before dequeuing the next address. Cancellation stops forward
/// progress; results produced before the cancel are kept, not rolled back.
#[derive(Clone)]
pub struct RunHandle {
    inner: Arc<RunControl>,
}

impl RunHandle {
    pub(crate) fn new(inner: Arc<RunControl>) -> Self {
        Self { inner }
    }

    /// Returns the run's current status without waiting.
    pub fn status(&self) -> RunStatus {
        self.inner.status()
    }

    /// Pauses the run: no new tile starts, in-flight tiles finish.
    ///
    /// No-op unless the run is currently `Running`.
    pub fn pause(&self) {
        if self
            .inner
            .transition(RunStatus::Paused, |s| s == RunStatus::Running)
        {
            self.inner.set_paused(true);
        }
    }

    /// Resumes a paused run.
    pub fn resume(&self) {
        if self
            .inner
            .transition(RunStatus::Running, |s| s == RunStatus::Paused)
        {
            self.inner.set_paused(false);
        }
    }

    /// Cancels the run.
    ///
    /// Effective from any non-terminal state, including `Paused`; the
    /// status transitions immediately, before in-flight tiles drain.
    pub fn cancel(&self) {
        if self
            .inner
            .transition(RunStatus::Cancelled, |s| !s.is_terminal())
        {
            self.inner.cancel.cancel();
        }
    }

    /// Waits until the run reaches a terminal status and returns it.
    pub async fn wait(&self) -> RunStatus {
        let mut rx = self.inner.subscribe_status();
        loop {
            let status = *rx.borrow_and_update();
            if status.is_terminal() {
                return status;
            }
            if rx.changed().await.is_err() {
                return self.inner.status();
            }
        }
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("status", &self.status())
            .finish()
    }
}
