//! Boundary between negotiation and the peer connection that carries media.

mod webrtc_backend;

pub use webrtc_backend::WebRtcBackend;

use crate::config::MediaConstraints;
use async_trait::async_trait;
use huddle_core::{IceCandidate, NegotiationRole, Result, SessionDescription};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one media session for as long as it lives. A negotiator that
/// is reset gets a new key, so late events of the old session are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(u64);

impl SessionKey {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub kind: TrackKind,
    pub id: String,
}

/// Captured local tracks, attached to every session opened with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMedia {
    pub stream_id: String,
    pub tracks: Vec<LocalTrack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Asynchronous notifications raised by a media session.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// A local candidate to trickle; `None` ends gathering.
    LocalCandidate(Option<IceCandidate>),
    ConnectionStateChanged(PeerConnectionState),
    DataChannelOpen,
    DataChannelClosed,
    ChatMessage(String),
    RemoteTrack { kind: TrackKind, id: String },
}

#[derive(Debug, Clone)]
pub struct MediaEnvelope {
    pub key: SessionKey,
    pub event: MediaEvent,
}

/// Sink a session uses to report its events back into the client loop.
#[derive(Debug, Clone)]
pub struct MediaEvents {
    key: SessionKey,
    tx: mpsc::Sender<MediaEnvelope>,
}

impl MediaEvents {
    pub fn new(key: SessionKey, tx: mpsc::Sender<MediaEnvelope>) -> Self {
        Self { key, tx }
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub async fn emit(&self, event: MediaEvent) {
        let envelope = MediaEnvelope {
            key: self.key,
            event,
        };
        if self.tx.send(envelope).await.is_err() {
            debug!("Media event for session {} dropped: client loop is gone", self.key);
        }
    }
}

/// Produces local media and peer connections.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn acquire_local_media(&self, constraints: &MediaConstraints) -> Result<LocalMedia>;

    async fn open_session(
        &self,
        media: LocalMedia,
        role: NegotiationRole,
        events: MediaEvents,
    ) -> Result<Box<dyn MediaSession>>;
}

/// One peer connection. Descriptions and candidates are opaque here.
#[async_trait]
pub trait MediaSession: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Sends a chat line over the session's data channel.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Stops local tracks and closes the data channel and the connection.
    async fn close(&self) -> Result<()>;
}
