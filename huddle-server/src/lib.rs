//! WebSocket signaling relay.
//!
//! Peers connect to `/ws/{room}` and exchange offer/answer/candidate frames.
//! The relay binds each connection to the `peerId` of its first frame,
//! delivers addressed frames (`to`) to one peer and broadcasts the rest to
//! the room.

mod config;
mod relay;

pub use config::RelayConfig;
pub use relay::{ConnectionId, RelayError, RelayService, router, serve, serve_on, ws_handler};
