//! Mock negotiation transport for tests.
//!
//! [`MockTransport`] answers offers without any networking and lets a test
//! drive connection events by hand.

use super::{
    Negotiation, NegotiationTransport, SessionDescription, TransportError, TransportEvent,
    TransportHandle, TRANSPORT_EVENT_BUFFER,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};

/// Scriptable transport.
///
/// - `accepting()` answers every non-empty offer
/// - `rejecting()` fails every negotiation
/// - `holding()` parks each negotiation until [`MockTransport::release`]
///
/// `hold_teardowns()` parks handle teardowns the same way until
/// [`MockTransport::release_teardown`].
pub struct MockTransport {
    reject: bool,
    fail_teardown: AtomicBool,
    gate: Option<Arc<Semaphore>>,
    hold_teardown: AtomicBool,
    teardown_gate: Arc<Semaphore>,
    negotiate_count: AtomicUsize,
    teardown_count: Arc<AtomicUsize>,
    completed_teardowns: Arc<AtomicUsize>,
    event_senders: Mutex<Vec<mpsc::Sender<TransportEvent>>>,
}

impl MockTransport {
    fn build(reject: bool, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            reject,
            fail_teardown: AtomicBool::new(false),
            gate,
            hold_teardown: AtomicBool::new(false),
            teardown_gate: Arc::new(Semaphore::new(0)),
            negotiate_count: AtomicUsize::new(0),
            teardown_count: Arc::new(AtomicUsize::new(0)),
            completed_teardowns: Arc::new(AtomicUsize::new(0)),
            event_senders: Mutex::new(Vec::new()),
        }
    }

    /// A transport that answers every non-empty offer.
    #[must_use]
    pub fn accepting() -> Self {
        Self::build(false, None)
    }

    /// A transport whose negotiations always fail.
    #[must_use]
    pub fn rejecting() -> Self {
        Self::build(true, None)
    }

    /// An accepting transport that blocks each negotiation until released.
    #[must_use]
    pub fn holding() -> Self {
        Self::build(false, Some(Arc::new(Semaphore::new(0))))
    }

    /// Let one held negotiation proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Make subsequent handle teardowns report an error.
    pub fn fail_teardowns(&self) {
        self.fail_teardown.store(true, Ordering::SeqCst);
    }

    /// Make handles negotiated from now on block in `close` until released.
    pub fn hold_teardowns(&self) {
        self.hold_teardown.store(true, Ordering::SeqCst);
    }

    /// Let one held teardown finish.
    pub fn release_teardown(&self) {
        self.teardown_gate.add_permits(1);
    }

    /// Number of `negotiate` calls, successful or not.
    pub fn negotiate_count(&self) -> usize {
        self.negotiate_count.load(Ordering::SeqCst)
    }

    /// Number of handle `close` calls across all negotiations.
    pub fn teardown_count(&self) -> usize {
        self.teardown_count.load(Ordering::SeqCst)
    }

    /// Number of handle `close` calls that ran to completion.
    pub fn completed_teardown_count(&self) -> usize {
        self.completed_teardowns.load(Ordering::SeqCst)
    }

    /// Deliver `event` to the most recent negotiated connection.
    ///
    /// Returns `false` if there is none or its session is gone.
    pub async fn emit_latest(&self, event: TransportEvent) -> bool {
        let sender = self.event_senders.lock().await.last().cloned();
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Drop the event stream of the most recent connection, as if the
    /// transport vanished.
    pub async fn drop_latest_events(&self) {
        self.event_senders.lock().await.pop();
    }
}

#[async_trait]
impl NegotiationTransport for MockTransport {
    async fn negotiate(&self, offer: &SessionDescription) -> Result<Negotiation, TransportError> {
        let n = self.negotiate_count.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| TransportError::Negotiation("mock gate closed".to_string()))?
                .forget();
        }

        if self.reject {
            return Err(TransportError::Negotiation(
                "mock transport rejects all offers".to_string(),
            ));
        }
        if offer.sdp.trim().is_empty() {
            return Err(TransportError::InvalidOffer("empty offer".to_string()));
        }

        let (tx, events) = mpsc::channel(TRANSPORT_EVENT_BUFFER);
        self.event_senders.lock().await.push(tx);

        Ok(Negotiation {
            answer: SessionDescription::answer(format!(
                "v=0\r\no=- {n} 0 IN IP4 127.0.0.1\r\ns=mock\r\nt=0 0\r\n"
            )),
            handle: Box::new(MockHandle {
                teardown_count: Arc::clone(&self.teardown_count),
                completed: Arc::clone(&self.completed_teardowns),
                gate: self
                    .hold_teardown
                    .load(Ordering::SeqCst)
                    .then(|| Arc::clone(&self.teardown_gate)),
                fail: self.fail_teardown.load(Ordering::SeqCst),
            }),
            events,
        })
    }
}

struct MockHandle {
    teardown_count: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
    fail: bool,
}

#[async_trait]
impl TransportHandle for MockHandle {
    async fn close(&self) -> Result<(), TransportError> {
        self.teardown_count.fetch_add(1, Ordering::SeqCst);
        match &self.gate {
            Some(gate) => {
                gate.acquire()
                    .await
                    .map_err(|_| TransportError::Teardown("mock gate closed".to_string()))?
                    .forget();
            }
            None => tokio::task::yield_now().await,
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(TransportError::Teardown("mock teardown failure".to_string()));
        }
        Ok(())
    }
}
