use crate::media::TrackKind;
use huddle_core::{ConnectionState, Error, NegotiationState, PeerId};

/// Notifications from the client loop to the application.
///
/// `peer` is `None` for the open call until someone answers it.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    StateChanged {
        peer: Option<PeerId>,
        state: NegotiationState,
        connection: ConnectionState,
    },

    /// The chat channel with `peer` can carry messages.
    ChatOpen { peer: Option<PeerId> },

    Chat { from: Option<PeerId>, text: String },

    RemoteTrack {
        from: Option<PeerId>,
        kind: TrackKind,
        id: String,
    },

    /// Something went wrong; the loop keeps running.
    Error(Error),

    /// The relay connection is gone and every session was closed.
    SignalingLost { reason: String },
}
