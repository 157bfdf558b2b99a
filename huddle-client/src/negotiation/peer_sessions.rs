use crate::media::{MediaEvent, SessionKey};
use crate::negotiation::{IceBuffer, NegotiationContext, Negotiator, SessionSnapshot};
use huddle_core::{
    Error, IceCandidate, NegotiationState, PeerId, Result, SessionDescription, SignalingMessage,
};
use std::collections::HashMap;
use tracing::debug;

/// All negotiations of the local peer, one per remote.
///
/// At most one open call (an offer without a recipient) exists at a time.
/// Candidates that reach us while it waits for its first answer are kept
/// per sender, up to a limit, and handed over to whichever peer answers.
pub struct PeerSessions {
    ctx: NegotiationContext,
    sessions: HashMap<PeerId, Negotiator>,
    open_call: Option<Negotiator>,
    early_candidates: HashMap<PeerId, IceBuffer>,
    early_limit: usize,
}

impl PeerSessions {
    pub fn new(ctx: NegotiationContext, early_limit: usize) -> Self {
        Self {
            ctx,
            sessions: HashMap::new(),
            open_call: None,
            early_candidates: HashMap::new(),
            early_limit,
        }
    }

    pub fn local(&self) -> &PeerId {
        &self.ctx.local
    }

    pub fn get(&self, peer: &PeerId) -> Option<&Negotiator> {
        self.sessions.get(peer)
    }

    pub fn open_call(&self) -> Option<&Negotiator> {
        self.open_call.as_ref()
    }

    /// Every negotiator, the open call first, then by remote id.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut peers: Vec<&Negotiator> = self.sessions.values().collect();
        peers.sort_by(|a, b| a.remote().cmp(&b.remote()));
        self.open_call
            .iter()
            .chain(peers)
            .map(Negotiator::snapshot)
            .collect()
    }

    /// The remote behind a session key: `Some(None)` for the open call,
    /// `None` when no live negotiator owns the key.
    pub fn remote_for(&self, key: SessionKey) -> Option<Option<PeerId>> {
        if self.open_call.as_ref().is_some_and(|n| n.key() == key) {
            return Some(None);
        }
        self.sessions
            .values()
            .find(|n| n.key() == key)
            .map(|n| n.remote().cloned())
    }

    /// Start a call to `to`, or an open call to the whole room.
    pub async fn call(&mut self, to: Option<PeerId>) -> Result<()> {
        let Some(peer) = to else {
            if let Some(open) = self.open_call.as_ref().filter(|n| !n.is_closed()) {
                return Err(Error::invalid_transition(
                    open.state(),
                    "start-call",
                    "an open call is already waiting for an answer",
                ));
            }
            let mut negotiator = Negotiator::new(self.ctx.clone(), None);
            negotiator.start_call().await?;
            self.open_call = Some(negotiator);
            return Ok(());
        };

        if peer == self.ctx.local {
            return Err(Error::invalid_transition(
                NegotiationState::Idle,
                "start-call",
                "cannot call ourselves",
            ));
        }
        self.negotiator_for(peer).start_call().await
    }

    pub async fn handle_signal(&mut self, msg: SignalingMessage) -> Result<()> {
        if msg.is_from(&self.ctx.local) || !msg.is_for(&self.ctx.local) {
            debug!("Ignoring {} not meant for us", msg.kind());
            return Ok(());
        }

        match msg {
            SignalingMessage::Offer { sdp, peer_id, .. } => self.on_offer(peer_id, sdp).await,
            SignalingMessage::Answer { sdp, peer_id, .. } => self.on_answer(peer_id, sdp).await,
            SignalingMessage::Candidate {
                candidate, peer_id, ..
            } => self.on_candidate(peer_id, candidate).await,
            SignalingMessage::Bye { peer_id, .. } => {
                self.on_bye(&peer_id).await;
                Ok(())
            }
        }
    }

    pub async fn handle_media_event(&mut self, key: SessionKey, event: MediaEvent) -> Result<()> {
        let negotiator = match self.open_call.as_mut().filter(|n| n.key() == key) {
            Some(negotiator) => negotiator,
            None => match self.sessions.values_mut().find(|n| n.key() == key) {
                Some(negotiator) => negotiator,
                None => {
                    debug!("Dropping event of finished session {}", key);
                    return Ok(());
                }
            },
        };
        negotiator.handle_media_event(event).await
    }

    /// Hang up on `peer`, or on everyone. Returns how many sessions closed.
    pub async fn hangup(&mut self, peer: Option<&PeerId>) -> usize {
        let mut closed = 0;
        match peer {
            Some(peer) => {
                if let Some(negotiator) = self.sessions.get_mut(peer) {
                    closed += usize::from(negotiator.hangup(true).await);
                }
            }
            None => {
                if let Some(open) = self.open_call.as_mut() {
                    closed += usize::from(open.hangup(true).await);
                }
                for negotiator in self.sessions.values_mut() {
                    closed += usize::from(negotiator.hangup(true).await);
                }
                self.early_candidates.clear();
            }
        }
        closed
    }

    /// Close every session after the relay connection was lost.
    pub async fn fail_all(&mut self, cause: &str) {
        if let Some(open) = self.open_call.as_mut() {
            open.fail(cause).await;
        }
        for negotiator in self.sessions.values_mut() {
            negotiator.fail(cause).await;
        }
        self.early_candidates.clear();
    }

    /// Send a chat line to `peer`, or to every connected peer. Returns how
    /// many peers it went to.
    pub async fn send_chat(&self, peer: Option<&PeerId>, text: &str) -> Result<usize> {
        if let Some(peer) = peer {
            let negotiator = self.sessions.get(peer).ok_or_else(|| {
                Error::invalid_transition(
                    NegotiationState::Idle,
                    "chat",
                    format!("no session with {peer}"),
                )
            })?;
            negotiator.send_chat(text).await?;
            return Ok(1);
        }

        let mut sent = 0;
        for negotiator in self.sessions.values() {
            if negotiator.state() == NegotiationState::Connected {
                negotiator.send_chat(text).await?;
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Forget closed negotiators and ones that never got past `Idle`.
    pub fn prune(&mut self) {
        self.sessions.retain(|_, n| match n.state() {
            NegotiationState::Closed => false,
            NegotiationState::Idle => n.buffered_candidates() > 0,
            _ => true,
        });
        if self
            .open_call
            .as_ref()
            .is_some_and(|n| matches!(n.state(), NegotiationState::Closed | NegotiationState::Idle))
        {
            self.open_call = None;
            self.early_candidates.clear();
        }
    }

    async fn on_offer(&mut self, from: PeerId, sdp: SessionDescription) -> Result<()> {
        if !self.sessions.contains_key(&from) {
            if let Some(negotiator) = self.claim_open_call(&from) {
                self.sessions.insert(from.clone(), negotiator);
            }
        }
        self.negotiator_for(from.clone()).handle_offer(from, sdp).await
    }

    async fn on_answer(&mut self, from: PeerId, sdp: SessionDescription) -> Result<()> {
        if !self.sessions.contains_key(&from) {
            let Some(negotiator) = self.claim_open_call(&from) else {
                let state = self
                    .open_call
                    .as_ref()
                    .map_or(NegotiationState::Idle, Negotiator::state);
                return Err(Error::invalid_transition(
                    state,
                    "answer",
                    format!("no offer outstanding for {from}"),
                ));
            };
            self.early_candidates.clear();
            self.sessions.insert(from.clone(), negotiator);
        }

        match self.sessions.get_mut(&from) {
            Some(negotiator) => negotiator.handle_answer(from, sdp).await,
            None => Ok(()),
        }
    }

    async fn on_candidate(&mut self, from: PeerId, candidate: Option<IceCandidate>) -> Result<()> {
        if let Some(negotiator) = self.sessions.get_mut(&from) {
            return negotiator.handle_candidate(&from, candidate).await;
        }

        let Some(open) = self
            .open_call
            .as_ref()
            .filter(|n| n.state() == NegotiationState::OfferSent)
        else {
            return Err(Error::invalid_transition(
                NegotiationState::Idle,
                "candidate",
                format!("no session with {from}"),
            ));
        };

        let Some(candidate) = candidate else {
            return Ok(());
        };
        let state = open.state();
        let limit = self.early_limit;
        let early = self
            .early_candidates
            .entry(from.clone())
            .or_insert_with(|| IceBuffer::with_limit(limit));
        if early.push(candidate) {
            debug!("Holding early candidate from {} ({} held)", from, early.len());
            Ok(())
        } else {
            Err(Error::invalid_transition(
                state,
                "candidate",
                format!("too many early candidates from {from}"),
            ))
        }
    }

    async fn on_bye(&mut self, from: &PeerId) {
        self.early_candidates.remove(from);
        match self.sessions.get_mut(from) {
            Some(negotiator) => {
                negotiator.hangup(false).await;
            }
            None => debug!("Bye from {} without a session", from),
        }
    }

    /// Hand the open call to `peer` if it is still waiting for an answer.
    fn claim_open_call(&mut self, peer: &PeerId) -> Option<Negotiator> {
        let mut negotiator = self
            .open_call
            .take_if(|n| n.state() == NegotiationState::OfferSent)?;
        if let Err(e) = negotiator.bind(peer.clone()) {
            debug!("Open call cannot be bound: {}", e);
            self.open_call = Some(negotiator);
            return None;
        }
        if let Some(mut early) = self.early_candidates.remove(peer) {
            negotiator.adopt_candidates(&mut early);
        }
        debug!("Open call {} bound to {}", negotiator.key(), peer);
        Some(negotiator)
    }

    fn negotiator_for(&mut self, peer: PeerId) -> &mut Negotiator {
        let ctx = &self.ctx;
        self.sessions
            .entry(peer.clone())
            .or_insert_with(|| Negotiator::new(ctx.clone(), Some(peer)))
    }
}
