use crate::model::NegotiationState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures observable by users of the signaling stack.
///
/// Only [`Error::MediaAcquisition`] ends the session being started; every
/// other category is logged by the component that detects it and the session
/// carries on.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Camera or microphone unavailable, denied, or nothing requested.
    #[error("media acquisition failed: {0}")]
    MediaAcquisition(String),

    /// The relay connection dropped or could not be reached.
    #[error("signaling transport error: {0}")]
    SignalingTransport(String),

    /// An inbound frame could not be decoded into a signaling message.
    #[error("malformed signaling message: {0}")]
    MalformedMessage(String),

    /// A message or intent arrived in a state that does not accept it.
    #[error("invalid state transition: {event} while {state} ({detail})")]
    InvalidStateTransition {
        state: NegotiationState,
        event: &'static str,
        detail: String,
    },

    /// A remote candidate was rejected by the media session.
    #[error("ice candidate application failed: {0}")]
    IceCandidateApplication(String),

    /// Offer/answer creation or description application failed.
    #[error("media session error: {0}")]
    MediaSession(String),
}

impl Error {
    pub fn invalid_transition(
        state: NegotiationState,
        event: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvalidStateTransition {
            state,
            event,
            detail: detail.into(),
        }
    }

    /// Whether the error ends the session it was raised for.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MediaAcquisition(_) | Self::SignalingTransport(_))
    }
}
