use crate::config::MediaConstraints;
use crate::media::{MediaBackend, MediaEnvelope};
use crate::signaling::SignalingOutput;
use huddle_core::PeerId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a negotiator needs from the outside world.
#[derive(Clone)]
pub struct NegotiationContext {
    pub local: PeerId,
    pub media: Arc<dyn MediaBackend>,
    pub signaling: Arc<dyn SignalingOutput>,
    pub constraints: MediaConstraints,
    /// Where sessions opened by this context report their events.
    pub media_tx: mpsc::Sender<MediaEnvelope>,
}
