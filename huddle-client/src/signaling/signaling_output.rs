use async_trait::async_trait;
use huddle_core::{IceCandidate, PeerId, Result, SessionDescription, SignalingMessage};

/// Outbound half of the signaling channel, as seen by a negotiator.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Queue one frame for the relay. Fails only when the channel is gone.
    async fn send(&self, msg: SignalingMessage) -> Result<()>;

    async fn send_offer(
        &self,
        from: &PeerId,
        to: Option<PeerId>,
        sdp: SessionDescription,
    ) -> Result<()> {
        self.send(SignalingMessage::Offer {
            sdp,
            peer_id: from.clone(),
            to,
        })
        .await
    }

    async fn send_answer(&self, from: &PeerId, to: PeerId, sdp: SessionDescription) -> Result<()> {
        self.send(SignalingMessage::Answer {
            sdp,
            peer_id: from.clone(),
            to: Some(to),
        })
        .await
    }

    async fn send_ice(
        &self,
        from: &PeerId,
        to: Option<PeerId>,
        candidate: Option<IceCandidate>,
    ) -> Result<()> {
        self.send(SignalingMessage::Candidate {
            candidate,
            peer_id: from.clone(),
            to,
        })
        .await
    }

    async fn send_bye(&self, from: &PeerId, to: PeerId) -> Result<()> {
        self.send(SignalingMessage::Bye {
            peer_id: from.clone(),
            to: Some(to),
        })
        .await
    }
}
