use crate::negotiation::SessionSnapshot;
use huddle_core::{PeerId, Result};
use tokio::sync::oneshot;

/// Requests from the application into the client loop.
#[derive(Debug)]
pub enum ClientCommand {
    /// Call `to`, or everyone in the room when `None`.
    Call {
        to: Option<PeerId>,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Hang up on `peer`, or on every session when `None`.
    Hangup {
        peer: Option<PeerId>,
        reply: oneshot::Sender<usize>,
    },

    Chat {
        to: Option<PeerId>,
        text: String,
        reply: oneshot::Sender<Result<usize>>,
    },

    Sessions {
        reply: oneshot::Sender<Vec<SessionSnapshot>>,
    },

    /// Hang up everything and stop the loop.
    Shutdown,
}
