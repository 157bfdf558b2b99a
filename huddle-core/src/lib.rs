//! Shared vocabulary of the huddle signaling system: peer identities, the
//! JSON wire frames exchanged through the relay, negotiation states and the
//! error taxonomy used by both the relay and the client.

pub mod codec;
mod error;
pub mod model;

pub use codec::{decode_frame, encode_frame};
pub use error::{Error, Result};
pub use model::{
    ConnectionState, IceCandidate, IceServerConfig, NegotiationRole, NegotiationState, PeerId,
    SdpType, SessionDescription, SignalingMessage,
};
