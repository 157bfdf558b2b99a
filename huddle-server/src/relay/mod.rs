mod relay_service;
mod ws_handler;

pub use relay_service::{ConnectionId, RelayError, RelayService};
pub use ws_handler::{router, serve, serve_on, ws_handler};
