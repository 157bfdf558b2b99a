//! Peer side of huddle: the per-peer negotiation state machine, the relay
//! adapter and the media backend, driven by one serialized event loop.

pub mod client;
mod config;
pub mod media;
pub mod negotiation;
pub mod signaling;

pub use client::{Client, ClientEvent, ClientHandle, SessionSnapshot};
pub use config::{ClientConfig, ConfigError, MediaConstraints, TransportConfig};
pub use media::{MediaBackend, MediaEvent, MediaSession, WebRtcBackend};
pub use negotiation::{IceBuffer, NegotiationContext, Negotiator, PeerSessions};
pub use signaling::{RelayClient, RelayEvent, SignalingOutput};
