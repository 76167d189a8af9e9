//! Negotiation transport boundary.
//!
//! The upload session core never touches media transport directly. It hands
//! an offer to a [`NegotiationTransport`] and gets back:
//!
//! - the answer description to return to the streaming client,
//! - a [`TransportHandle`] that can force the connection closed,
//! - a stream of [`TransportEvent`]s reporting connection lifecycle.
//!
//! ```text
//! offer ──> NegotiationTransport::negotiate ──> Negotiation
//!                                                ├── answer
//!                                                ├── handle (close)
//!                                                └── events (Connected / Disconnected)
//! ```
//!
//! Production uses [`rtc::WebRtcTransport`]; tests use [`mock::MockTransport`].

pub mod mock;
pub mod rtc;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

pub use mock::MockTransport;
pub use rtc::WebRtcTransport;

/// Buffer size for transport event channels.
pub const TRANSPORT_EVENT_BUFFER: usize = 16;

/// Kind of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description exchanged once during negotiation.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    /// Wrap a raw SDP offer payload.
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Wrap a raw SDP answer payload.
    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// SDP bodies carry ICE credentials, so Debug only shows their size.
impl fmt::Debug for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescription")
            .field("sdp_type", &self.sdp_type)
            .field("sdp_len", &self.sdp.len())
            .finish()
    }
}

/// Lifecycle events emitted by a negotiated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and media can flow.
    Connected,
    /// The connection failed or was lost.
    Disconnected { reason: String },
}

/// Transport boundary errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The offer could not be parsed or applied.
    #[error("Invalid offer: {0}")]
    InvalidOffer(String),

    /// The transport failed while negotiating.
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Tearing down the connection reported an error.
    #[error("Teardown failed: {0}")]
    Teardown(String),
}

/// Result of a successful negotiation.
pub struct Negotiation {
    /// Answer to surface to the remote peer.
    pub answer: SessionDescription,
    /// Exclusive handle to the negotiated connection.
    pub handle: Box<dyn TransportHandle>,
    /// Connection lifecycle events. The stream ending means the transport is gone.
    pub events: mpsc::Receiver<TransportEvent>,
}

impl fmt::Debug for Negotiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiation")
            .field("answer", &self.answer)
            .finish_non_exhaustive()
    }
}

/// Produces negotiated connections from client offers.
#[async_trait]
pub trait NegotiationTransport: Send + Sync {
    /// Negotiate a connection for `offer`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the offer is malformed or negotiation fails.
    /// No connection is left open on error.
    async fn negotiate(&self, offer: &SessionDescription) -> Result<Negotiation, TransportError>;
}

/// Handle to one negotiated connection.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Force the connection closed.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Teardown` if the underlying transport reports
    /// an error while closing.
    async fn close(&self) -> Result<(), TransportError>;
}
