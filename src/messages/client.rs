//! Message emission for analysis workers.
//!
//! The [`MessageClient`] is the producers' side of the channel. It is:
//!
//! - **Cheap to clone**: backed by a channel sender
//! - **Fire-and-forget**: never blocks, silently drops after consumer exit
//! - **Type-safe**: one convenience method per message kind

use super::event::{AnalysisMessage, TileErrorKind};
use crate::classify::TileResult;
use crate::coord::TileAddress;
use crate::dispatch::RunStatus;
use tokio::sync::mpsc;

/// Client for publishing analysis messages to the store daemon.
///
/// All methods are fire-and-forget: publishing never blocks a worker, and
/// failures after the daemon has shut down are ignored. Clone freely and
/// hand one to every worker.
#[derive(Clone)]
pub struct MessageClient {
    tx: mpsc::UnboundedSender<AnalysisMessage>,
}

impl MessageClient {
    /// Creates a client wrapping the given channel sender.
    pub fn new(tx: mpsc::UnboundedSender<AnalysisMessage>) -> Self {
        Self { tx }
    }

    /// Creates a connected client/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AnalysisMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    #[inline]
    fn send(&self, message: AnalysisMessage) {
        // Ignore send errors - the daemon may have shut down.
        let _ = self.tx.send(message);
    }

    /// Publishes absolute run progress.
    #[inline]
    pub fn progress(&self, completed: usize, total: usize) {
        self.send(AnalysisMessage::Progress { completed, total });
    }

    /// Publishes a finished tile result.
    #[inline]
    pub fn result(&self, address: TileAddress, result: TileResult) {
        self.send(AnalysisMessage::Result { address, result });
    }

    /// Publishes a recoverable per-tile failure.
    #[inline]
    pub fn error(&self, address: TileAddress, kind: TileErrorKind, detail: impl Into<String>) {
        self.send(AnalysisMessage::Error {
            address,
            kind,
            detail: detail.into(),
        });
    }

    /// Publishes a run status transition.
    #[inline]
    pub fn status_changed(&self, status: RunStatus) {
        self.send(AnalysisMessage::StatusChanged { status });
    }
}

impl std::fmt::Debug for MessageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageClient")
            .field("channel_closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Label;

    #[tokio::test]
    async fn test_client_publishes_all_kinds() {
        let (client, mut rx) = MessageClient::channel();
        let address = TileAddress::new(1, 2);

        client.progress(3, 10);
        client.result(
            address,
            TileResult::manual(address, Label::Continuity, "ok".to_string()),
        );
        client.error(address, TileErrorKind::Classification, "quota");
        client.status_changed(RunStatus::Paused);

        assert!(matches!(
            rx.recv().await,
            Some(AnalysisMessage::Progress {
                completed: 3,
                total: 10
            })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(AnalysisMessage::Result { address: a, .. }) if a == address
        ));
        assert!(matches!(
            rx.recv().await,
            Some(AnalysisMessage::Error {
                kind: TileErrorKind::Classification,
                ..
            })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(AnalysisMessage::StatusChanged {
                status: RunStatus::Paused
            })
        ));
    }

    #[test]
    fn test_client_survives_dropped_receiver() {
        let (client, rx) = MessageClient::channel();
        drop(rx);

        // Fire-and-forget - must not panic.
        client.progress(1, 1);
        client.status_changed(RunStatus::Completed);
    }

    #[test]
    fn test_client_clone_shares_channel() {
        let (client, mut rx) = MessageClient::channel();
        let cloned = client.clone();

        client.progress(1, 2);
        cloned.progress(2, 2);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }
}
