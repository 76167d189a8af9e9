//! WebRTC ingestion transport.
//!
//! Each negotiation creates one `RTCPeerConnection` with receive-only audio
//! and video transceivers, applies the client's offer, and returns the local
//! answer once ICE gathering completes (bounded by [`ICE_GATHER_TIMEOUT`]).
//!
//! Peer connection state changes are forwarded as [`TransportEvent`]s:
//!
//! | `RTCPeerConnectionState` | Event |
//! |---|---|
//! | `Connected` | `Connected` |
//! | `Failed`, `Disconnected`, `Closed` | `Disconnected` |

use super::{
    Negotiation, NegotiationTransport, SessionDescription, TransportError, TransportEvent,
    TransportHandle, TRANSPORT_EVENT_BUFFER,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// Upper bound on ICE candidate gathering before the answer is returned.
pub const ICE_GATHER_TIMEOUT: Duration = Duration::from_secs(10);

/// WebRTC implementation of [`NegotiationTransport`].
pub struct WebRtcTransport {
    api: API,
    ice_servers: Vec<String>,
}

impl WebRtcTransport {
    /// Build a transport using the default codecs and interceptors.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Negotiation` if codec or interceptor
    /// registration fails.
    pub fn new(ice_servers: Vec<String>) -> Result<Self, TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| TransportError::Negotiation(format!("codec registration: {e}")))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| TransportError::Negotiation(format!("interceptor registration: {e}")))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, ice_servers })
    }

    fn configuration(&self) -> RTCConfiguration {
        let ice_servers = if self.ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };

        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }

    async fn answer_offer(
        pc: &Arc<RTCPeerConnection>,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, TransportError> {
        for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
            pc.add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: Vec::new(),
                }),
            )
            .await
            .map_err(|e| TransportError::Negotiation(format!("add transceiver: {e}")))?;
        }

        let remote = RTCSessionDescription::offer(offer.sdp.clone())
            .map_err(|e| TransportError::InvalidOffer(e.to_string()))?;
        pc.set_remote_description(remote)
            .await
            .map_err(|e| TransportError::InvalidOffer(e.to_string()))?;

        let answer = pc
            .create_answer(None)
            .await
            .map_err(|e| TransportError::Negotiation(format!("create answer: {e}")))?;

        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(answer)
            .await
            .map_err(|e| TransportError::Negotiation(format!("set local description: {e}")))?;

        if tokio::time::timeout(ICE_GATHER_TIMEOUT, gather_complete.recv())
            .await
            .is_err()
        {
            warn!(
                target: "live.transport.rtc",
                timeout_secs = ICE_GATHER_TIMEOUT.as_secs(),
                "ICE gathering did not complete, answering with partial candidates"
            );
        }

        let local = pc.local_description().await.ok_or_else(|| {
            TransportError::Negotiation("local description unavailable".to_string())
        })?;

        Ok(SessionDescription::answer(local.sdp))
    }
}

#[async_trait]
impl NegotiationTransport for WebRtcTransport {
    #[instrument(skip_all, name = "live.transport.negotiate")]
    async fn negotiate(&self, offer: &SessionDescription) -> Result<Negotiation, TransportError> {
        let pc = Arc::new(
            self.api
                .new_peer_connection(self.configuration())
                .await
                .map_err(|e| TransportError::Negotiation(format!("peer connection: {e}")))?,
        );

        let (tx, events) = mpsc::channel(TRANSPORT_EVENT_BUFFER);
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let tx = tx.clone();
            Box::pin(async move {
                debug!(target: "live.transport.rtc", state = %state, "Peer connection state changed");
                let event = match state {
                    RTCPeerConnectionState::Connected => Some(TransportEvent::Connected),
                    RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Disconnected
                    | RTCPeerConnectionState::Closed => Some(TransportEvent::Disconnected {
                        reason: state.to_string(),
                    }),
                    _ => None,
                };
                if let Some(event) = event {
                    // Receiver is gone once the session has exited.
                    let _ = tx.send(event).await;
                }
            })
        }));

        match Self::answer_offer(&pc, offer).await {
            Ok(answer) => {
                info!(target: "live.transport.rtc", "Offer negotiated");
                Ok(Negotiation {
                    answer,
                    handle: Box::new(WebRtcHandle { pc }),
                    events,
                })
            }
            Err(e) => {
                if let Err(close_err) = pc.close().await {
                    warn!(
                        target: "live.transport.rtc",
                        error = %close_err,
                        "Failed to close peer connection after negotiation error"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Handle owning one negotiated peer connection.
struct WebRtcHandle {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl TransportHandle for WebRtcHandle {
    async fn close(&self) -> Result<(), TransportError> {
        self.pc
            .close()
            .await
            .map_err(|e| TransportError::Teardown(e.to_string()))
    }
}
