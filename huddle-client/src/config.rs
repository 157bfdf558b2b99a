use huddle_core::{IceServerConfig, PeerId};
use std::env;
use thiserror::Error;

const DEFAULT_STUN: &str = "stun:stun.l.google.com:19302";
const DEFAULT_STRAY_CANDIDATE_LIMIT: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("{var} has an invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// ICE servers handed to every peer connection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl TransportConfig {
    /// Host candidates only, for peers on the same machine or LAN.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN)],
        }
    }
}

/// Local media requested when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `ws://` or `wss://` URL of the relay, room path included.
    pub signaling_url: String,
    pub peer_id: PeerId,
    pub transport: TransportConfig,
    pub media: MediaConstraints,
    /// Candidates kept per unknown peer while an open offer waits for its
    /// first answer.
    pub stray_candidate_limit: usize,
}

impl ClientConfig {
    pub fn new(signaling_url: impl Into<String>) -> Self {
        Self {
            signaling_url: signaling_url.into(),
            peer_id: PeerId::new(),
            transport: TransportConfig::default(),
            media: MediaConstraints::default(),
            stray_candidate_limit: DEFAULT_STRAY_CANDIDATE_LIMIT,
        }
    }

    pub fn with_peer_id(mut self, peer_id: PeerId) -> Self {
        self.peer_id = peer_id;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_media(mut self, media: MediaConstraints) -> Self {
        self.media = media;
        self
    }

    /// Builds a config from `HUDDLE_SIGNALING_URL` (required), plus the
    /// optional `HUDDLE_PEER_ID`, `HUDDLE_ICE_SERVERS` (comma separated),
    /// `HUDDLE_AUDIO` and `HUDDLE_VIDEO`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|var| env::var(var).ok())
    }

    /// Layer the optional `HUDDLE_*` variables over this config.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|var| env::var(var).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("HUDDLE_SIGNALING_URL")
            .ok_or(ConfigError::Missing("HUDDLE_SIGNALING_URL"))?;
        let config = Self::new(url);
        config.validate()?;
        config.apply_vars(lookup)
    }

    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(id) = lookup("HUDDLE_PEER_ID") {
            if !id.trim().is_empty() {
                self.peer_id = PeerId::from(id.trim());
            }
        }
        if let Some(servers) = lookup("HUDDLE_ICE_SERVERS") {
            self.transport.ice_servers = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(IceServerConfig::stun)
                .collect();
        }
        if let Some(value) = lookup("HUDDLE_AUDIO") {
            self.media.audio = parse_flag("HUDDLE_AUDIO", &value)?;
        }
        if let Some(value) = lookup("HUDDLE_VIDEO") {
            self.media.video = parse_flag("HUDDLE_VIDEO", &value)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.signaling_url.as_str();
        if url.starts_with("ws://") || url.starts_with("wss://") {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                var: "HUDDLE_SIGNALING_URL",
                value: url.to_owned(),
            })
        }
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_owned(),
        }),
    }
}
