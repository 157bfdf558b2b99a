use crate::media::{MediaEvent, MediaEvents, MediaSession, PeerConnectionState, SessionKey};
use crate::negotiation::{IceBuffer, NegotiationContext};
use huddle_core::{
    ConnectionState, Error, IceCandidate, NegotiationRole, NegotiationState, PeerId, Result,
    SessionDescription,
};
use tracing::{debug, info, warn};

/// Read-only view of one negotiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub key: SessionKey,
    pub remote: Option<PeerId>,
    pub state: NegotiationState,
    pub role: NegotiationRole,
    pub connection: ConnectionState,
    pub buffered_candidates: usize,
}

/// Offer/answer state machine for the session with one remote peer.
///
/// A negotiator without a remote is an open call: its offer went out as a
/// broadcast and it binds to whoever answers first.
pub struct Negotiator {
    ctx: NegotiationContext,
    key: SessionKey,
    remote: Option<PeerId>,
    state: NegotiationState,
    role: NegotiationRole,
    connection: ConnectionState,
    session: Option<Box<dyn MediaSession>>,
    remote_description_applied: bool,
    pending: IceBuffer,
}

impl Negotiator {
    pub fn new(ctx: NegotiationContext, remote: Option<PeerId>) -> Self {
        Self {
            ctx,
            key: SessionKey::next(),
            remote,
            state: NegotiationState::Idle,
            role: NegotiationRole::Unset,
            connection: ConnectionState::New,
            session: None,
            remote_description_applied: false,
            pending: IceBuffer::new(),
        }
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn remote(&self) -> Option<&PeerId> {
        self.remote.as_ref()
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_closed(&self) -> bool {
        self.state == NegotiationState::Closed
    }

    pub fn buffered_candidates(&self) -> usize {
        self.pending.len()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            key: self.key,
            remote: self.remote.clone(),
            state: self.state,
            role: self.role,
            connection: self.connection,
            buffered_candidates: self.pending.len(),
        }
    }

    /// Tie an open call to the peer that answered it.
    pub fn bind(&mut self, remote: PeerId) -> Result<()> {
        match &self.remote {
            Some(bound) if *bound != remote => Err(Error::invalid_transition(
                self.state,
                "bind",
                format!("already negotiating with {bound}"),
            )),
            _ => {
                self.remote = Some(remote);
                Ok(())
            }
        }
    }

    /// Take over candidates that arrived before this negotiator was bound.
    pub fn adopt_candidates(&mut self, early: &mut IceBuffer) {
        self.pending.append(early);
    }

    /// Acquire media, create and apply an offer, then send it.
    ///
    /// On any failure the partial session is closed and the state stays
    /// `Idle`.
    pub async fn start_call(&mut self) -> Result<()> {
        if self.state == NegotiationState::Closed {
            self.reset();
        }
        if self.state != NegotiationState::Idle {
            return Err(Error::invalid_transition(
                self.state,
                "start-call",
                "a session is already in progress",
            ));
        }

        let session = self.open_session(NegotiationRole::Initiator).await?;
        let sent = async {
            let offer = session.create_offer().await?;
            session.set_local_description(offer.clone()).await?;
            self.ctx
                .signaling
                .send_offer(&self.ctx.local, self.remote.clone(), offer)
                .await
        }
        .await;

        if let Err(e) = sent {
            Self::discard(session).await;
            self.key = SessionKey::next();
            return Err(e);
        }

        info!("Offer sent to {}", self.who());
        self.session = Some(session);
        self.role = NegotiationRole::Initiator;
        self.connection = ConnectionState::Negotiating;
        self.set_state(NegotiationState::OfferSent);
        Ok(())
    }

    pub async fn handle_offer(&mut self, from: PeerId, sdp: SessionDescription) -> Result<()> {
        self.check_sender(&from, "offer")?;

        match self.state {
            NegotiationState::Closed => {
                self.reset();
                self.accept_offer(from, sdp).await
            }
            NegotiationState::Idle => self.accept_offer(from, sdp).await,
            NegotiationState::OfferSent => self.resolve_collision(from, sdp).await,
            state => Err(Error::invalid_transition(
                state,
                "offer",
                format!("renegotiation with {from} is not supported"),
            )),
        }
    }

    pub async fn handle_answer(&mut self, from: PeerId, sdp: SessionDescription) -> Result<()> {
        if self.state != NegotiationState::OfferSent {
            return Err(Error::invalid_transition(
                self.state,
                "answer",
                format!("no offer outstanding for {from}"),
            ));
        }
        self.check_sender(&from, "answer")?;

        let Some(session) = self.session.as_deref() else {
            return Err(Error::invalid_transition(
                self.state,
                "answer",
                "no media session",
            ));
        };
        session.set_remote_description(sdp).await?;

        self.remote = Some(from);
        self.remote_description_applied = true;
        self.flush_pending().await;
        self.set_state(NegotiationState::AnswerReceived);
        info!("Answer from {} applied", self.who());
        Ok(())
    }

    /// Apply a remote candidate, or queue it until the remote description
    /// is in place. `None` only marks the end of the remote's gathering.
    pub async fn handle_candidate(
        &mut self,
        from: &PeerId,
        candidate: Option<IceCandidate>,
    ) -> Result<()> {
        if self.state == NegotiationState::Closed {
            return Err(Error::invalid_transition(
                self.state,
                "candidate",
                format!("session with {from} is closed"),
            ));
        }
        self.check_sender(from, "candidate")?;

        let Some(candidate) = candidate else {
            debug!("{} finished gathering candidates", from);
            return Ok(());
        };

        match self.session.as_deref() {
            Some(session) if self.remote_description_applied => {
                session.add_ice_candidate(candidate).await
            }
            _ => {
                self.pending.push(candidate);
                debug!(
                    "Buffered candidate from {} ({} queued)",
                    from,
                    self.pending.len()
                );
                Ok(())
            }
        }
    }

    pub async fn handle_media_event(&mut self, event: MediaEvent) -> Result<()> {
        match event {
            MediaEvent::LocalCandidate(candidate) => {
                if matches!(
                    self.state,
                    NegotiationState::Idle | NegotiationState::Closed
                ) {
                    debug!("Dropping local candidate of inactive session {}", self.key);
                    return Ok(());
                }
                self.ctx
                    .signaling
                    .send_ice(&self.ctx.local, self.remote.clone(), candidate)
                    .await
            }
            MediaEvent::ConnectionStateChanged(state) => self.on_connection_state(state).await,
            other => {
                debug!("Session {} event {:?}", self.key, other);
                Ok(())
            }
        }
    }

    /// Close the session and, if asked, tell the remote with a `bye`.
    /// Returns `false` when there was nothing left to close.
    pub async fn hangup(&mut self, notify_remote: bool) -> bool {
        if self.state == NegotiationState::Closed {
            return false;
        }
        let was_active = self.state != NegotiationState::Idle;
        self.close_session(ConnectionState::Closed).await;
        info!("Hung up session with {}", self.who());

        if notify_remote && was_active {
            if let Some(remote) = self.remote.clone() {
                let sent = self.ctx.signaling.send_bye(&self.ctx.local, remote.clone());
                if let Err(e) = sent.await {
                    warn!("Could not tell {} about the hangup: {}", remote, e);
                }
            }
        }
        true
    }

    /// Close after a fatal condition; the connection is marked failed.
    pub async fn fail(&mut self, cause: &str) {
        if self.state == NegotiationState::Closed {
            return;
        }
        warn!("Session with {} failed: {}", self.who(), cause);
        self.close_session(ConnectionState::Failed).await;
    }

    pub async fn send_chat(&self, text: &str) -> Result<()> {
        match self.session.as_deref() {
            Some(session) if self.state == NegotiationState::Connected => {
                session.send_text(text).await
            }
            _ => Err(Error::invalid_transition(
                self.state,
                "chat",
                format!("not connected to {}", self.who()),
            )),
        }
    }

    async fn on_connection_state(&mut self, state: PeerConnectionState) -> Result<()> {
        match state {
            PeerConnectionState::New | PeerConnectionState::Connecting => Ok(()),
            PeerConnectionState::Connected => {
                if !self.state.is_negotiated() {
                    return Err(Error::invalid_transition(
                        self.state,
                        "connected",
                        "media connected before the exchange finished",
                    ));
                }
                self.connection = ConnectionState::Connected;
                self.set_state(NegotiationState::Connected);
                Ok(())
            }
            PeerConnectionState::Disconnected => {
                warn!("Connection to {} interrupted", self.who());
                Ok(())
            }
            PeerConnectionState::Failed => {
                self.fail("peer connection failed").await;
                Err(Error::MediaSession(format!(
                    "connection to {} failed",
                    self.who()
                )))
            }
            PeerConnectionState::Closed => {
                if self.state != NegotiationState::Closed {
                    self.close_session(ConnectionState::Closed).await;
                }
                Ok(())
            }
        }
    }

    async fn accept_offer(&mut self, from: PeerId, sdp: SessionDescription) -> Result<()> {
        self.set_state(NegotiationState::OfferReceived);
        self.remote = Some(from.clone());

        match self.answer_offer(&from, sdp).await {
            Ok(session) => {
                self.session = Some(session);
                self.role = NegotiationRole::Responder;
                self.connection = ConnectionState::Negotiating;
                self.set_state(NegotiationState::AnswerSent);
                info!("Answered offer from {}", from);
                Ok(())
            }
            Err(e) => {
                self.key = SessionKey::next();
                self.remote_description_applied = false;
                self.set_state(NegotiationState::Idle);
                Err(e)
            }
        }
    }

    async fn answer_offer(
        &mut self,
        from: &PeerId,
        sdp: SessionDescription,
    ) -> Result<Box<dyn MediaSession>> {
        let session = self.open_session(NegotiationRole::Responder).await?;

        let answered = async {
            session.set_remote_description(sdp).await?;
            self.remote_description_applied = true;
            let queued = self.pending.drain();
            Self::apply_candidates(session.as_ref(), queued).await;

            let answer = session.create_answer().await?;
            session.set_local_description(answer.clone()).await?;
            self.ctx
                .signaling
                .send_answer(&self.ctx.local, from.clone(), answer)
                .await
        }
        .await;

        match answered {
            Ok(()) => Ok(session),
            Err(e) => {
                Self::discard(session).await;
                Err(e)
            }
        }
    }

    /// Simultaneous offers: the peer with the smaller id drops its own
    /// offer and answers; the other keeps waiting for its answer and forgets
    /// candidates queued so far.
    async fn resolve_collision(&mut self, from: PeerId, sdp: SessionDescription) -> Result<()> {
        if self.ctx.local < from {
            info!("Offer collision with {}: yielding", from);
            self.release_session().await;
            self.reset();
            self.accept_offer(from, sdp).await
        } else {
            // Queued candidates belong to the offer the remote is abandoning.
            if !self.pending.is_empty() {
                debug!(
                    "Dropping {} candidates of {}'s offer",
                    self.pending.len(),
                    from
                );
                self.pending.clear();
            }
            Err(Error::invalid_transition(
                self.state,
                "offer",
                format!("collision with {from}, keeping our own offer"),
            ))
        }
    }

    async fn open_session(&self, role: NegotiationRole) -> Result<Box<dyn MediaSession>> {
        let media = self
            .ctx
            .media
            .acquire_local_media(&self.ctx.constraints)
            .await?;
        let events = MediaEvents::new(self.key, self.ctx.media_tx.clone());
        self.ctx.media.open_session(media, role, events).await
    }

    async fn flush_pending(&mut self) {
        let queued = self.pending.drain();
        if let Some(session) = self.session.as_deref() {
            Self::apply_candidates(session, queued).await;
        }
    }

    async fn apply_candidates(session: &dyn MediaSession, queued: Vec<IceCandidate>) {
        if queued.is_empty() {
            return;
        }
        debug!("Applying {} buffered candidates", queued.len());
        for candidate in queued {
            if let Err(e) = session.add_ice_candidate(candidate).await {
                warn!("Buffered candidate rejected: {}", e);
            }
        }
    }

    async fn close_session(&mut self, connection: ConnectionState) {
        self.set_state(NegotiationState::Closed);
        self.connection = connection;
        self.remote_description_applied = false;
        self.pending.clear();
        self.release_session().await;
    }

    async fn release_session(&mut self) {
        if let Some(session) = self.session.take() {
            Self::discard(session).await;
        }
    }

    async fn discard(session: Box<dyn MediaSession>) {
        if let Err(e) = session.close().await {
            warn!("Failed to close media session: {}", e);
        }
    }

    /// Back to `Idle` under a fresh key. Queued candidates survive.
    fn reset(&mut self) {
        self.key = SessionKey::next();
        self.role = NegotiationRole::Unset;
        self.connection = ConnectionState::New;
        self.remote_description_applied = false;
        self.set_state(NegotiationState::Idle);
    }

    fn check_sender(&self, from: &PeerId, event: &'static str) -> Result<()> {
        match &self.remote {
            Some(remote) if remote != from => Err(Error::invalid_transition(
                self.state,
                event,
                format!("from {from} while negotiating with {remote}"),
            )),
            _ => Ok(()),
        }
    }

    fn set_state(&mut self, next: NegotiationState) {
        if self.state != next {
            debug!(
                "Session {} with {}: {} -> {}",
                self.key,
                self.who(),
                self.state,
                next
            );
            self.state = next;
        }
    }

    fn who(&self) -> &str {
        self.remote.as_ref().map_or("anyone", PeerId::as_str)
    }
}
