use crate::error::MediaError;
use crate::media::{ConnectionState, MediaEvent, MediaFactory, MediaSession, TransportConfig};
use async_trait::async_trait;
use meshlink_core::{IceCandidate, IceServerConfig, SdpType, SessionDescription, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

/// Creates one `RTCPeerConnection` per link.
#[derive(Clone, Default)]
pub struct WebRtcMediaFactory {
    config: TransportConfig,
}

impl WebRtcMediaFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MediaFactory for WebRtcMediaFactory {
    async fn create(
        &self,
        local: SessionId,
        remote: SessionId,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Box<dyn MediaSession>, MediaError> {
        debug!("Creating peer connection {} -> {}", local, remote);
        let session = WebRtcSession::new(remote, &self.config, events).await?;
        Ok(Box::new(session))
    }
}

pub struct WebRtcSession {
    remote: SessionId,
    peer_connection: Arc<RTCPeerConnection>,
}

impl WebRtcSession {
    async fn new(
        remote: SessionId,
        config: &TransportConfig,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Self, MediaError> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()
            .map_err(|e| MediaError::operation("register codecs", e))?;
        let registry = register_default_interceptors(Registry::new(), &mut m)
            .map_err(|e| MediaError::operation("register interceptors", e))?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config.ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| MediaError::operation("create peer connection", e))?,
        );

        peer_connection
            .add_transceiver_from_kind(RTPCodecType::Audio, None)
            .await
            .map_err(|e| MediaError::operation("add audio transceiver", e))?;
        if config.video {
            peer_connection
                .add_transceiver_from_kind(RTPCodecType::Video, None)
                .await
                .map_err(|e| MediaError::operation("add video transceiver", e))?;
        }

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {:?}", remote, s);
                    if let Some(state) = from_rtc_state(s) {
                        let _ = tx.send(MediaEvent::StateChanged {
                            peer: remote,
                            state,
                        });
                    }
                })
            },
        ));

        let ice_tx = events;
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx.send(MediaEvent::LocalCandidate {
                    peer: remote,
                    candidate: from_rtc_candidate(init),
                });
            })
        }));

        Ok(Self {
            remote,
            peer_connection,
        })
    }
}

#[async_trait]
impl MediaSession for WebRtcSession {
    async fn create_offer(&self) -> Result<SessionDescription, MediaError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| MediaError::operation("create offer", e))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, MediaError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| MediaError::operation("create answer", e))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(
        &self,
        mut description: SessionDescription,
    ) -> Result<(), MediaError> {
        if description.sdp_type == SdpType::Rollback {
            // webrtc-rs only accepts a rollback that carries the offer it undoes.
            let Some(pending) = self.peer_connection.pending_local_description().await else {
                debug!("No local offer to roll back for {}", self.remote);
                return Ok(());
            };
            description.sdp = pending.sdp;
        }

        let desc = to_rtc_description(description)?;
        self.peer_connection
            .set_local_description(desc)
            .await
            .map_err(|e| MediaError::operation("set local description", e))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), MediaError> {
        let desc = to_rtc_description(description)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(|e| MediaError::operation("set remote description", e))
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: candidate.username_fragment,
            })
            .await
            .map_err(|e| MediaError::operation("add candidate", e))
    }

    async fn close(&self) -> Result<(), MediaError> {
        debug!("Closing peer connection to {}", self.remote);
        self.peer_connection
            .close()
            .await
            .map_err(|e| MediaError::operation("close", e))
    }
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription, MediaError> {
    let desc = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(description.sdp),
        SdpType::Rollback => {
            let mut rollback = RTCSessionDescription::default();
            rollback.sdp_type = RTCSdpType::Rollback;
            rollback.sdp = description.sdp;
            return Ok(rollback);
        }
    };
    desc.map_err(|e| MediaError::operation("parse description", e))
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn from_rtc_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
        RTCPeerConnectionState::Unspecified => None,
    }
}
