mod context;
mod ice_buffer;
mod negotiator;
mod peer_sessions;

pub use context::NegotiationContext;
pub use ice_buffer::IceBuffer;
pub use negotiator::{Negotiator, SessionSnapshot};
pub use peer_sessions::PeerSessions;
