//! Upload session registry.
//!
//! Holds at most one slot per streaming identity:
//!
//! | Slot | Meaning | Visible via `get` |
//! |---|---|---|
//! | `Negotiating` | identity reserved, transport negotiating | no |
//! | `Pending` | negotiated, waiting for `begin` | no |
//! | `Active` | `begin` fired | yes |
//!
//! Each registered session has one observer task. It promotes the slot on
//! `begin`, enforces the negotiation timeout, and removes the slot on `exit`.
//! Removal is conditional on the slot still holding the same session.
//!
//! `close_all` puts the registry into shutdown: later begins are refused and
//! a negotiation that finishes after it is closed instead of registered.

use super::session::{SessionState, UploadSession};
use crate::errors::LiveError;
use crate::observability::metrics::{self, UploadOutcome};
use crate::transport::{NegotiationTransport, SessionDescription};
use common::types::UserId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

enum Slot {
    Negotiating,
    Pending(Arc<UploadSession>),
    Active(Arc<UploadSession>),
}

impl Slot {
    fn session(&self) -> Option<&Arc<UploadSession>> {
        match self {
            Slot::Negotiating => None,
            Slot::Pending(session) | Slot::Active(session) => Some(session),
        }
    }

    fn holds(&self, session: &Arc<UploadSession>) -> bool {
        self.session()
            .is_some_and(|current| Arc::ptr_eq(current, session))
    }
}

/// Registry enforcing one upload session per streaming identity.
pub struct UploadSessionRegistry {
    transport: Arc<dyn NegotiationTransport>,
    negotiation_timeout: Option<Duration>,
    sessions: DashMap<UserId, Slot>,
    shutdown: CancellationToken,
}

impl UploadSessionRegistry {
    /// Create a registry negotiating through `transport`.
    ///
    /// Sessions still Pending `negotiation_timeout` after registration are
    /// closed. `None` disables the timeout.
    #[must_use]
    pub fn new(
        transport: Arc<dyn NegotiationTransport>,
        negotiation_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            negotiation_timeout,
            sessions: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start an upload session for `owner` and return the answer.
    ///
    /// # Errors
    ///
    /// - `AlreadyStreaming` if `owner` already holds a slot; the transport
    ///   is not invoked
    /// - `Negotiation` if the transport fails; the reservation is released
    /// - `ServiceUnavailable` once `close_all` has run
    #[instrument(skip_all, name = "live.upload.begin_session", fields(owner = %owner))]
    pub async fn begin_session(
        self: &Arc<Self>,
        owner: UserId,
        offer: SessionDescription,
    ) -> Result<SessionDescription, LiveError> {
        if self.shutdown.is_cancelled() {
            return Err(Self::shutting_down());
        }

        let reservation = match self.sessions.entry(owner) {
            Entry::Occupied(_) => {
                metrics::record_upload_session(UploadOutcome::Rejected);
                debug!(target: "live.upload", owner = %owner, "Identity already streaming");
                return Err(LiveError::AlreadyStreaming);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Negotiating);
                Reservation {
                    sessions: &self.sessions,
                    owner,
                    committed: false,
                }
            }
        };
        self.update_gauge();

        let session =
            match UploadSession::negotiate(self.transport.as_ref(), owner, offer).await {
                Ok(session) => session,
                Err(e) => {
                    drop(reservation);
                    self.update_gauge();
                    metrics::record_upload_session(UploadOutcome::Failed);
                    warn!(target: "live.upload", owner = %owner, error = %e, "Negotiation failed");
                    return Err(e.into());
                }
            };

        reservation.commit(Slot::Pending(Arc::clone(&session)));
        self.spawn_observer(&session);

        // Checked after commit so close_all either sees the slot or we see it
        if self.shutdown.is_cancelled() {
            if let Err(e) = session.close().await {
                warn!(target: "live.upload", owner = %owner, error = %e, "Transport teardown failed");
            }
            self.release(&session);
            metrics::record_upload_session(UploadOutcome::Rejected);
            return Err(Self::shutting_down());
        }

        metrics::record_upload_session(UploadOutcome::Started);
        info!(target: "live.upload", owner = %owner, "Upload session started");

        Ok(session.answer().clone())
    }

    /// The owner's session, once it has become Active.
    #[must_use]
    pub fn get(&self, owner: UserId) -> Option<Arc<UploadSession>> {
        self.sessions.get(&owner).and_then(|slot| match slot.value() {
            Slot::Active(session) => Some(Arc::clone(session)),
            Slot::Negotiating | Slot::Pending(_) => None,
        })
    }

    /// Close the owner's pending or active session.
    ///
    /// # Errors
    ///
    /// Returns `NotStreaming` if the owner has no pending or active session.
    /// Teardown failures are logged, not returned.
    #[instrument(skip_all, name = "live.upload.end_session", fields(owner = %owner))]
    pub async fn end_session(&self, owner: UserId) -> Result<(), LiveError> {
        let session = self
            .sessions
            .get(&owner)
            .and_then(|slot| slot.session().cloned())
            .filter(|session| session.state() != SessionState::Closed)
            .ok_or(LiveError::NotStreaming)?;

        if let Err(e) = session.close().await {
            warn!(target: "live.upload", owner = %owner, error = %e, "Transport teardown failed");
        }
        self.release(&session);

        info!(target: "live.upload", owner = %owner, "Upload session ended");
        Ok(())
    }

    /// Number of occupied slots (negotiating, pending and active).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of Active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Active(_)))
            .count()
    }

    /// Close every registered session and refuse new ones. Used at shutdown.
    pub async fn close_all(&self) {
        self.shutdown.cancel();

        let sessions: Vec<Arc<UploadSession>> = self
            .sessions
            .iter()
            .filter_map(|slot| slot.session().cloned())
            .collect();

        for session in sessions {
            if let Err(e) = session.close().await {
                warn!(
                    target: "live.upload",
                    owner = %session.owner(),
                    error = %e,
                    "Transport teardown failed during shutdown"
                );
            }
            self.release(&session);
        }
    }

    fn shutting_down() -> LiveError {
        LiveError::ServiceUnavailable("upload registry is shutting down".to_string())
    }

    /// Remove the owner's slot if it still holds `session`.
    fn release(&self, session: &Arc<UploadSession>) -> bool {
        let removed = self
            .sessions
            .remove_if(&session.owner(), |_, slot| slot.holds(session))
            .is_some();
        if removed {
            self.update_gauge();
        }
        removed
    }

    /// Pending -> Active for the owner's slot, if it still holds `session`.
    fn promote(&self, session: &Arc<UploadSession>) {
        if let Some(mut slot) = self.sessions.get_mut(&session.owner()) {
            let pending = match slot.value() {
                Slot::Pending(current) if Arc::ptr_eq(current, session) => {
                    Some(Arc::clone(current))
                }
                _ => None,
            };
            if let Some(current) = pending {
                *slot = Slot::Active(current);
            }
        }
    }

    fn update_gauge(&self) {
        metrics::set_upload_sessions_active(self.sessions.len());
    }

    fn spawn_observer(self: &Arc<Self>, session: &Arc<UploadSession>) {
        // Deadline counts from registration, not from the observer's first poll
        let deadline = self
            .negotiation_timeout
            .map(|timeout| Instant::now() + timeout);
        tokio::spawn(observe(Arc::downgrade(self), Arc::clone(session), deadline));
    }
}

/// Follow one session from registration to exit.
async fn observe(
    registry: Weak<UploadSessionRegistry>,
    session: Arc<UploadSession>,
    deadline: Option<Instant>,
) {
    let owner = session.owner();
    let deadline = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut begun = false;
    let mut timed_out = false;

    loop {
        tokio::select! {
            biased;
            () = session.exit() => break,
            () = session.begin(), if !begun => {
                begun = true;
                if let Some(registry) = registry.upgrade() {
                    registry.promote(&session);
                }
            }
            () = &mut deadline, if !begun && !timed_out => {
                timed_out = true;
                if session.state() == SessionState::Pending {
                    warn!(target: "live.upload", owner = %owner, "Negotiation timed out, closing upload session");
                    metrics::record_upload_session(UploadOutcome::TimedOut);
                    if let Err(e) = session.close().await {
                        warn!(target: "live.upload", owner = %owner, error = %e, "Transport teardown failed");
                    }
                }
            }
        }
    }

    if let Some(registry) = registry.upgrade() {
        registry.release(&session);
    }
    metrics::record_upload_session(UploadOutcome::Ended);
    debug!(target: "live.upload", owner = %owner, "Upload session observer finished");
}

/// An identity's `Negotiating` slot, released on drop unless committed.
struct Reservation<'a> {
    sessions: &'a DashMap<UserId, Slot>,
    owner: UserId,
    committed: bool,
}

impl Reservation<'_> {
    fn commit(mut self, slot: Slot) {
        self.sessions.insert(self.owner, slot);
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.sessions
                .remove_if(&self.owner, |_, slot| matches!(slot, Slot::Negotiating));
        }
    }
}
