use crate::config::{MediaConstraints, TransportConfig};
use crate::media::{
    LocalMedia, LocalTrack, MediaBackend, MediaEvent, MediaEvents, MediaSession,
    PeerConnectionState, TrackKind,
};
use anyhow::Context;
use async_trait::async_trait;
use huddle_core::{
    Error, IceCandidate, NegotiationRole, PeerId, Result, SdpType, SessionDescription,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

const CHAT_CHANNEL: &str = "chat";
const RTP_BUFFER: usize = 1500;

type ChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

/// Media backend on top of webrtc-rs. Local media is a pair of RTP tracks
/// (Opus and VP8) that the application can feed through the peer connection.
#[derive(Debug, Clone, Default)]
pub struct WebRtcBackend {
    transport: TransportConfig,
}

impl WebRtcBackend {
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl MediaBackend for WebRtcBackend {
    async fn acquire_local_media(&self, constraints: &MediaConstraints) -> Result<LocalMedia> {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(LocalTrack {
                kind: TrackKind::Audio,
                id: "audio".to_owned(),
            });
        }
        if constraints.video {
            tracks.push(LocalTrack {
                kind: TrackKind::Video,
                id: "video".to_owned(),
            });
        }
        if tracks.is_empty() {
            return Err(Error::MediaAcquisition(
                "neither audio nor video was requested".to_owned(),
            ));
        }

        Ok(LocalMedia {
            stream_id: format!("stream-{}", PeerId::new()),
            tracks,
        })
    }

    async fn open_session(
        &self,
        media: LocalMedia,
        role: NegotiationRole,
        events: MediaEvents,
    ) -> Result<Box<dyn MediaSession>> {
        let session = WebRtcSession::open(&self.transport, &media, role, events)
            .await
            .map_err(|e| Error::MediaSession(format!("{e:#}")))?;
        Ok(Box::new(session))
    }
}

struct WebRtcSession {
    peer_connection: Arc<RTCPeerConnection>,
    chat: ChannelSlot,
}

impl WebRtcSession {
    async fn open(
        transport: &TransportConfig,
        media: &LocalMedia,
        role: NegotiationRole,
        events: MediaEvents,
    ) -> anyhow::Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: transport
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let chat: ChannelSlot = Arc::new(Mutex::new(None));

        for track in &media.tracks {
            add_local_track(&peer_connection, track, &media.stream_id).await?;
        }

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!("Peer connection {} is now {}", events.key(), s);
                    let state = match s {
                        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => {
                            PeerConnectionState::New
                        }
                        RTCPeerConnectionState::Connecting => PeerConnectionState::Connecting,
                        RTCPeerConnectionState::Connected => PeerConnectionState::Connected,
                        RTCPeerConnectionState::Disconnected => PeerConnectionState::Disconnected,
                        RTCPeerConnectionState::Failed => PeerConnectionState::Failed,
                        RTCPeerConnectionState::Closed => PeerConnectionState::Closed,
                    };
                    events
                        .emit(MediaEvent::ConnectionStateChanged(state))
                        .await;
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let candidate = match c {
                    Some(c) => match c.to_json() {
                        Ok(init) => Some(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                            username_fragment: init.username_fragment,
                        }),
                        Err(e) => {
                            warn!("Dropping unserializable local candidate: {}", e);
                            return;
                        }
                    },
                    None => None,
                };
                events.emit(MediaEvent::LocalCandidate(candidate)).await;
            })
        }));

        let track_events = events.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let events = track_events.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    RTPCodecType::Video => TrackKind::Video,
                    RTPCodecType::Unspecified => return,
                };
                let id = track.id();
                events.emit(MediaEvent::RemoteTrack { kind, id }).await;

                // The read loop runs apart so the next on_track can fire.
                tokio::spawn(async move {
                    let mut buf = vec![0u8; RTP_BUFFER];
                    while track.read(&mut buf).await.is_ok() {}
                    debug!("Remote track {} stopped", track.id());
                });
            })
        }));

        match role {
            NegotiationRole::Initiator => {
                let channel = peer_connection
                    .create_data_channel(CHAT_CHANNEL, None)
                    .await
                    .context("Failed to create chat channel")?;
                wire_chat_channel(&channel, events.clone());
                *chat.lock().await = Some(channel);
            }
            NegotiationRole::Responder | NegotiationRole::Unset => {
                let slot = chat.clone();
                let dc_events = events.clone();
                peer_connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
                    let slot = slot.clone();
                    let events = dc_events.clone();
                    Box::pin(async move {
                        debug!("Remote opened data channel '{}'", channel.label());
                        wire_chat_channel(&channel, events);
                        *slot.lock().await = Some(channel);
                    })
                }));
            }
        }

        Ok(Self {
            peer_connection,
            chat,
        })
    }
}

async fn add_local_track(
    peer_connection: &Arc<RTCPeerConnection>,
    track: &LocalTrack,
    stream_id: &str,
) -> anyhow::Result<()> {
    let capability = match track.kind {
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
            rtcp_feedback: vec![],
        },
        TrackKind::Video => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            channels: 0,
            sdp_fmtp_line: String::new(),
            rtcp_feedback: vec![],
        },
    };

    let local = Arc::new(TrackLocalStaticRTP::new(
        capability,
        track.id.clone(),
        stream_id.to_owned(),
    ));
    let rtp_sender = peer_connection
        .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
        .await
        .with_context(|| format!("Failed to add {} track", track.id))?;

    let id = track.id.clone();
    tokio::spawn(async move {
        let mut rtcp_buf = vec![0u8; RTP_BUFFER];
        while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
        debug!("RTCP reader for local {} track stopped", id);
    });
    Ok(())
}

fn wire_chat_channel(channel: &Arc<RTCDataChannel>, events: MediaEvents) {
    let open_events = events.clone();
    channel.on_open(Box::new(move || {
        Box::pin(async move {
            open_events.emit(MediaEvent::DataChannelOpen).await;
        })
    }));

    let close_events = events.clone();
    channel.on_close(Box::new(move || {
        let events = close_events.clone();
        Box::pin(async move {
            events.emit(MediaEvent::DataChannelClosed).await;
        })
    }));

    channel.on_message(Box::new(move |msg: DataChannelMessage| {
        let events = events.clone();
        let text = String::from_utf8_lossy(&msg.data).into_owned();
        Box::pin(async move {
            events.emit(MediaEvent::ChatMessage(text)).await;
        })
    }));
}

fn session_error(e: impl std::fmt::Display) -> Error {
    Error::MediaSession(e.to_string())
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp),
        SdpType::Rollback => {
            return Err(Error::MediaSession("rollback is not supported".to_owned()));
        }
    };
    rtc.map_err(session_error)
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Unspecified => {
            return Err(Error::MediaSession("description has no type".to_owned()));
        }
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}

#[async_trait]
impl MediaSession for WebRtcSession {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(session_error)?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(session_error)?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await
            .map_err(session_error)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await
            .map_err(session_error)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::IceCandidateApplication(e.to_string()))
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        let channel = self
            .chat
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::MediaSession("chat channel is not open".to_owned()))?;
        channel
            .send_text(text.to_owned())
            .await
            .map(|_| ())
            .map_err(session_error)
    }

    async fn close(&self) -> Result<()> {
        if let Some(channel) = self.chat.lock().await.take() {
            if let Err(e) = channel.close().await {
                debug!("Chat channel close failed: {}", e);
            }
        }
        self.peer_connection.close().await.map_err(session_error)
    }
}
