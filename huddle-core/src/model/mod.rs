mod ice;
mod peer;
mod signaling;
mod state;

pub use ice::IceServerConfig;
pub use peer::PeerId;
pub use signaling::{IceCandidate, SdpType, SessionDescription, SignalingMessage};
pub use state::{ConnectionState, NegotiationRole, NegotiationState};
