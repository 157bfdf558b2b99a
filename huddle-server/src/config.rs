use std::env;
use std::net::SocketAddr;

const DEFAULT_BIND: ([u8; 4], u16) = ([0, 0, 0, 0], 8080);
const DEFAULT_MAX_MESSAGE_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    /// Largest accepted WebSocket message; SDP blobs stay well below this.
    pub max_message_size: usize,
}

impl RelayConfig {
    /// Reads `HUDDLE_RELAY_BIND` and `HUDDLE_RELAY_MAX_MESSAGE_SIZE`, falling
    /// back to defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind: env::var("HUDDLE_RELAY_BIND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind),
            max_message_size: env::var("HUDDLE_RELAY_MAX_MESSAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_message_size),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(DEFAULT_BIND),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}
