use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Session description as produced by a peer connection: `{type, sdp}`.
///
/// The SDP body itself is never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Trickle ICE candidate in the browser's `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// One frame on the signaling relay.
///
/// `peerId` is always the sender. `to` is optional: without it the relay
/// broadcasts the frame to every other peer in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SignalingMessage {
    Offer {
        sdp: SessionDescription,
        peer_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
    },
    Answer {
        sdp: SessionDescription,
        peer_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
    },
    /// `candidate: null` marks the end of the sender's gathering.
    Candidate {
        #[serde(default)]
        candidate: Option<IceCandidate>,
        peer_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
    },
    /// The sender closed its session with the recipient.
    Bye {
        peer_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
    },
}

impl SignalingMessage {
    pub fn sender(&self) -> &PeerId {
        match self {
            Self::Offer { peer_id, .. }
            | Self::Answer { peer_id, .. }
            | Self::Candidate { peer_id, .. }
            | Self::Bye { peer_id, .. } => peer_id,
        }
    }

    pub fn recipient(&self) -> Option<&PeerId> {
        match self {
            Self::Offer { to, .. }
            | Self::Answer { to, .. }
            | Self::Candidate { to, .. }
            | Self::Bye { to, .. } => to.as_ref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Bye { .. } => "bye",
        }
    }

    /// Whether this frame was sent by `local` and must be ignored by it.
    pub fn is_from(&self, local: &PeerId) -> bool {
        self.sender() == local
    }

    /// Whether a frame seen by `local` is meant for it: either broadcast or
    /// addressed to it explicitly.
    pub fn is_for(&self, local: &PeerId) -> bool {
        self.recipient().is_none_or(|to| to == local)
    }
}
