//! Upload session state machine.
//!
//! ```text
//!            Connected
//!  Pending ───────────> Active
//!     │                   │
//!     │ close / lost      │ close / lost
//!     └──────> Closed <───┘
//! ```
//!
//! `begin` fires on the Pending -> Active edge. `exit` fires once the session
//! reaches Closed and its transport handle has been torn down. Both are
//! one-shot and observable by any number of waiters.

use crate::transport::{
    NegotiationTransport, SessionDescription, TransportError, TransportEvent, TransportHandle,
};
use common::types::UserId;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, instrument, warn};

const PENDING: u8 = 0;
const ACTIVE: u8 = 1;
const CLOSED: u8 = 2;

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Negotiated, waiting for the transport to connect.
    Pending,
    /// Connected and uploading.
    Active,
    /// Terminal.
    Closed,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            PENDING => SessionState::Pending,
            ACTIVE => SessionState::Active,
            _ => SessionState::Closed,
        }
    }
}

/// One streaming identity's ingestion session.
pub struct UploadSession {
    owner: UserId,
    offer: SessionDescription,
    answer: SessionDescription,
    state: AtomicU8,
    handle: Mutex<Option<Box<dyn TransportHandle>>>,
    begin: CancellationToken,
    exit: CancellationToken,
}

impl fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSession")
            .field("owner", &self.owner)
            .field("state", &self.state())
            .field("answer", &self.answer)
            .finish_non_exhaustive()
    }
}

impl UploadSession {
    /// Negotiate `offer` through `transport` and return the Pending session.
    ///
    /// Spawns the session's event pump, which runs until `exit` fires.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if negotiation fails. No session exists
    /// in that case.
    #[instrument(skip_all, name = "live.upload.negotiate", fields(owner = %owner))]
    pub async fn negotiate(
        transport: &dyn NegotiationTransport,
        owner: UserId,
        offer: SessionDescription,
    ) -> Result<Arc<Self>, TransportError> {
        let negotiation = transport.negotiate(&offer).await?;

        let session = Arc::new(Self {
            owner,
            offer,
            answer: negotiation.answer,
            state: AtomicU8::new(PENDING),
            handle: Mutex::new(Some(negotiation.handle)),
            begin: CancellationToken::new(),
            exit: CancellationToken::new(),
        });

        tokio::spawn(pump_events(Arc::clone(&session), negotiation.events));

        debug!(target: "live.upload", owner = %owner, "Upload session negotiated");
        Ok(session)
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn offer(&self) -> &SessionDescription {
        &self.offer
    }

    #[must_use]
    pub fn answer(&self) -> &SessionDescription {
        &self.answer
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Resolves once the session has become Active.
    ///
    /// Never resolves for a session that closed while Pending.
    pub fn begin(&self) -> WaitForCancellationFuture<'_> {
        self.begin.cancelled()
    }

    /// Resolves once the session has closed and its transport is torn down.
    pub fn exit(&self) -> WaitForCancellationFuture<'_> {
        self.exit.cancelled()
    }

    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exit.is_cancelled()
    }

    /// Promote Pending -> Active and fire `begin`.
    ///
    /// Returns `false` (and does nothing) from any other state.
    pub fn mark_active(&self) -> bool {
        let promoted = self
            .state
            .compare_exchange(PENDING, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if promoted {
            self.begin.cancel();
            info!(target: "live.upload", owner = %self.owner, "Upload session active");
        }
        promoted
    }

    /// Close the session and tear down its transport.
    ///
    /// Always leaves the session Closed. Only the first call tears the
    /// transport down; later or concurrent calls return `Ok(())` at once.
    /// Teardown runs on its own task and `exit` fires when it finishes, so
    /// dropping the returned future does not cut teardown short.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Teardown` if the transport reported an error
    /// while closing. The transition to Closed happens regardless.
    pub async fn close(&self) -> Result<(), TransportError> {
        let previous = self.state.swap(CLOSED, Ordering::AcqRel);
        if previous == CLOSED {
            return Ok(());
        }

        let exit_guard = self.exit.clone().drop_guard();
        // Only the caller that won the swap takes the handle
        let handle = self.handle.lock().await.take();

        let teardown = tokio::spawn(async move {
            let _exit_guard = exit_guard;
            match handle {
                Some(handle) => handle.close().await,
                None => Ok(()),
            }
        });
        let result = teardown.await.unwrap_or_else(|e| {
            Err(TransportError::Teardown(format!("teardown task failed: {e}")))
        });

        info!(
            target: "live.upload",
            owner = %self.owner,
            from = ?SessionState::from_u8(previous),
            "Upload session closed"
        );
        result
    }
}

/// Map transport events onto the state machine until the session exits.
async fn pump_events(session: Arc<UploadSession>, mut events: mpsc::Receiver<TransportEvent>) {
    loop {
        tokio::select! {
            biased;
            () = session.exit() => break,
            event = events.recv() => {
                let reason = match event {
                    Some(TransportEvent::Connected) => {
                        session.mark_active();
                        continue;
                    }
                    Some(TransportEvent::Disconnected { reason }) => reason,
                    None => "transport event stream ended".to_string(),
                };

                debug!(
                    target: "live.upload",
                    owner = %session.owner,
                    reason = %reason,
                    "Transport lost, closing upload session"
                );
                if let Err(e) = session.close().await {
                    warn!(
                        target: "live.upload",
                        owner = %session.owner,
                        error = %e,
                        "Transport teardown failed"
                    );
                }
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::time::Duration;

    async fn negotiated(mock: &MockTransport) -> Arc<UploadSession> {
        UploadSession::negotiate(mock, UserId::new(), SessionDescription::offer("v=0"))
            .await
            .unwrap()
    }

    async fn within<F: std::future::Future>(fut: F) -> F::Output {
        tokio::time::timeout(Duration::from_secs(1), fut)
            .await
            .expect("future should complete")
    }

    #[tokio::test]
    async fn test_negotiate_yields_pending_session() {
        let mock = MockTransport::accepting();
        let session = negotiated(&mock).await;

        assert_eq!(session.state(), SessionState::Pending);
        assert!(session.answer().sdp.starts_with("v=0"));
        assert_eq!(session.offer().sdp, "v=0");
        assert!(!session.has_exited());
    }

    #[tokio::test]
    async fn test_negotiate_failure_returns_error() {
        let mock = MockTransport::rejecting();

        let result =
            UploadSession::negotiate(&mock, UserId::new(), SessionDescription::offer("v=0")).await;

        assert!(matches!(result, Err(TransportError::Negotiation(_))));
    }

    #[tokio::test]
    async fn test_connected_event_activates_and_fires_begin() {
        let mock = MockTransport::accepting();
        let session = negotiated(&mock).await;

        assert!(mock.emit_latest(TransportEvent::Connected).await);
        within(session.begin()).await;

        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_mark_active_only_from_pending() {
        let mock = MockTransport::accepting();
        let session = negotiated(&mock).await;

        assert!(session.mark_active());
        assert!(!session.mark_active());

        session.close().await.unwrap();
        assert!(!session.mark_active());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_close_from_pending_fires_exit_not_begin() {
        let mock = MockTransport::accepting();
        let session = negotiated(&mock).await;

        session.close().await.unwrap();
        within(session.exit()).await;

        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.begin.is_cancelled());
        assert_eq!(mock.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_close_twice_tears_down_once() {
        let mock = MockTransport::accepting();
        let session = negotiated(&mock).await;
        session.mark_active();

        session.close().await.unwrap();
        session.close().await.unwrap();

        assert_eq!(mock.teardown_count(), 1);
        assert!(session.has_exited());
    }

    #[tokio::test]
    async fn test_concurrent_close_tears_down_once() {
        let mock = MockTransport::accepting();
        let session = negotiated(&mock).await;

        let mut closers = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            closers.push(tokio::spawn(async move { session.close().await }));
        }
        for closer in closers {
            within(closer).await.unwrap().unwrap();
        }

        within(session.exit()).await;
        assert_eq!(mock.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_teardown_error_still_closes() {
        let mock = MockTransport::accepting();
        mock.fail_teardowns();
        let session = negotiated(&mock).await;

        let result = session.close().await;

        assert!(matches!(result, Err(TransportError::Teardown(_))));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.has_exited());
    }

    #[tokio::test]
    async fn test_disconnect_event_closes_session() {
        let mock = MockTransport::accepting();
        let session = negotiated(&mock).await;
        mock.emit_latest(TransportEvent::Connected).await;
        within(session.begin()).await;

        mock.emit_latest(TransportEvent::Disconnected {
            reason: "ice failed".to_string(),
        })
        .await;
        within(session.exit()).await;

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(mock.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_event_stream_end_closes_session() {
        let mock = MockTransport::accepting();
        let session = negotiated(&mock).await;

        mock.drop_latest_events().await;
        within(session.exit()).await;

        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_events_after_exit_are_ignored() {
        let mock = MockTransport::accepting();
        let session = negotiated(&mock).await;

        session.close().await.unwrap();
        // Pump has stopped; the receiver may already be gone
        mock.emit_latest(TransportEvent::Connected).await;
        tokio::task::yield_now().await;

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(mock.teardown_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_close_still_finishes_teardown() {
        let mock = MockTransport::accepting();
        mock.hold_teardowns();
        let session = negotiated(&mock).await;

        let closer = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.close().await })
        };
        within(async {
            while mock.teardown_count() == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await;

        // The caller goes away mid-teardown
        closer.abort();
        let _ = closer.await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.has_exited());

        mock.release_teardown();
        within(session.exit()).await;

        assert_eq!(mock.completed_teardown_count(), 1);
        assert_eq!(mock.teardown_count(), 1);
    }
}
