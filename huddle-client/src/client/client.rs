use crate::client::{ClientCommand, ClientEvent, ClientHandle};
use crate::config::ClientConfig;
use crate::media::{MediaBackend, MediaEnvelope, MediaEvent, WebRtcBackend};
use crate::negotiation::{NegotiationContext, PeerSessions, SessionSnapshot};
use crate::signaling::{RelayClient, RelayEvent, SignalingOutput};
use huddle_core::{Error, NegotiationState, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;
const MEDIA_BUFFER: usize = 256;

/// Event loop of one peer.
///
/// Commands, relay frames and media events are handled one at a time, so
/// every negotiator sees a strictly serialized stream of inputs.
pub struct Client {
    sessions: PeerSessions,
    command_rx: mpsc::Receiver<ClientCommand>,
    relay_rx: mpsc::Receiver<RelayEvent>,
    relay_open: bool,
    media_rx: mpsc::Receiver<MediaEnvelope>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
}

impl Client {
    pub fn new(
        config: &ClientConfig,
        media: Arc<dyn MediaBackend>,
        signaling: Arc<dyn SignalingOutput>,
        relay_rx: mpsc::Receiver<RelayEvent>,
    ) -> (Self, ClientHandle, mpsc::UnboundedReceiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (media_tx, media_rx) = mpsc::channel(MEDIA_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let ctx = NegotiationContext {
            local: config.peer_id.clone(),
            media,
            signaling,
            constraints: config.media,
            media_tx,
        };

        let client = Self {
            sessions: PeerSessions::new(ctx, config.stray_candidate_limit),
            command_rx,
            relay_rx,
            relay_open: true,
            media_rx,
            events_tx,
        };
        (client, ClientHandle::new(command_tx), events_rx)
    }

    /// Connect to the relay and use webrtc-rs for media.
    pub async fn connect(
        config: &ClientConfig,
    ) -> Result<(Self, ClientHandle, mpsc::UnboundedReceiver<ClientEvent>)> {
        let media = Arc::new(WebRtcBackend::new(config.transport.clone()));
        Self::connect_with(config, media).await
    }

    pub async fn connect_with(
        config: &ClientConfig,
        media: Arc<dyn MediaBackend>,
    ) -> Result<(Self, ClientHandle, mpsc::UnboundedReceiver<ClientEvent>)> {
        let (relay, relay_rx) =
            RelayClient::connect(&config.signaling_url, config.peer_id.clone()).await?;
        Ok(Self::new(config, media, Arc::new(relay), relay_rx))
    }

    pub async fn run(mut self) {
        info!("Client {} event loop started", self.sessions.local());

        loop {
            let before = self.sessions.snapshot();

            let keep_running = tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(ClientCommand::Shutdown) | None => {
                            let closed = self.sessions.hangup(None).await;
                            info!("Shutting down, {} sessions closed", closed);
                            false
                        }
                        Some(c) => {
                            self.handle_command(c).await;
                            true
                        }
                    }
                }

                evt = self.relay_rx.recv(), if self.relay_open => {
                    match evt {
                        Some(e) => self.handle_relay_event(e).await,
                        None => self.on_signaling_lost("relay adapter stopped".to_owned()).await,
                    }
                    true
                }

                Some(envelope) = self.media_rx.recv() => {
                    self.handle_media(envelope).await;
                    true
                }
            };

            self.publish_changes(&before);
            self.sessions.prune();

            if !keep_running {
                break;
            }
        }

        info!("Client event loop finished");
    }

    async fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Call { to, reply } => {
                let result = match self.ensure_relay() {
                    Ok(()) => self.sessions.call(to).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = &result {
                    warn!("Call failed: {}", e);
                }
                let _ = reply.send(result);
            }

            ClientCommand::Hangup { peer, reply } => {
                let closed = self.sessions.hangup(peer.as_ref()).await;
                let _ = reply.send(closed);
            }

            ClientCommand::Chat { to, text, reply } => {
                let result = match self.ensure_relay() {
                    Ok(()) => self.sessions.send_chat(to.as_ref(), &text).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }

            ClientCommand::Sessions { reply } => {
                let _ = reply.send(self.sessions.snapshot());
            }

            ClientCommand::Shutdown => {}
        }
    }

    async fn handle_relay_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Signal(msg) => {
                debug!("Received {} from {}", msg.kind(), msg.sender());
                if let Err(e) = self.sessions.handle_signal(msg).await {
                    self.report(e);
                }
            }
            RelayEvent::Malformed(e) => self.report(e),
            RelayEvent::Disconnected(reason) => self.on_signaling_lost(reason).await,
        }
    }

    async fn handle_media(&mut self, envelope: MediaEnvelope) {
        let Some(peer) = self.sessions.remote_for(envelope.key) else {
            debug!("Dropping event of finished session {}", envelope.key);
            return;
        };

        match envelope.event {
            MediaEvent::ChatMessage(text) => self.emit(ClientEvent::Chat { from: peer, text }),
            MediaEvent::DataChannelOpen => self.emit(ClientEvent::ChatOpen { peer }),
            MediaEvent::RemoteTrack { kind, id } => {
                self.emit(ClientEvent::RemoteTrack {
                    from: peer,
                    kind,
                    id,
                });
            }
            event => {
                if let Err(e) = self.sessions.handle_media_event(envelope.key, event).await {
                    self.report(e);
                }
            }
        }
    }

    async fn on_signaling_lost(&mut self, reason: String) {
        warn!("Signaling relay lost: {}", reason);
        self.relay_open = false;
        self.sessions.fail_all(&reason).await;
        self.emit(ClientEvent::Error(Error::SignalingTransport(reason.clone())));
        self.emit(ClientEvent::SignalingLost { reason });
    }

    fn ensure_relay(&self) -> Result<()> {
        if self.relay_open {
            Ok(())
        } else {
            Err(Error::SignalingTransport(
                "not connected to the signaling relay".to_owned(),
            ))
        }
    }

    fn publish_changes(&self, before: &[SessionSnapshot]) {
        for now in self.sessions.snapshot() {
            let changed = match before.iter().find(|b| b.key == now.key) {
                Some(b) => b.state != now.state || b.connection != now.connection,
                None => now.state != NegotiationState::Idle,
            };
            if changed {
                self.emit(ClientEvent::StateChanged {
                    peer: now.remote,
                    state: now.state,
                    connection: now.connection,
                });
            }
        }
    }

    fn report(&self, e: Error) {
        warn!("{}", e);
        self.emit(ClientEvent::Error(e));
    }

    fn emit(&self, event: ClientEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("Client event dropped: nobody is listening");
        }
    }
}
