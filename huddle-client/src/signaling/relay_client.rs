use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use huddle_core::{Error, PeerId, Result, SignalingMessage, decode_frame, encode_frame};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 256;

/// What the relay adapter hands to the client loop.
#[derive(Debug)]
pub enum RelayEvent {
    Signal(SignalingMessage),
    /// A frame that could not be decoded. Nothing else happens for it.
    Malformed(Error),
    /// The relay connection ended; no further events follow.
    Disconnected(String),
}

/// Outcome of looking at one inbound text frame.
#[derive(Debug)]
pub enum Inbound {
    Signal(SignalingMessage),
    /// Well-formed, but not for this peer.
    Ignored(&'static str),
    Malformed(Error),
}

/// Decode a frame and drop the ones `local` must not act on: its own
/// broadcasts echoed back and frames addressed to someone else.
pub fn classify_frame(text: &str, local: &PeerId) -> Inbound {
    let msg = match decode_frame(text) {
        Ok(msg) => msg,
        Err(e) => return Inbound::Malformed(e),
    };
    if msg.is_from(local) {
        return Inbound::Ignored("own frame");
    }
    if !msg.is_for(local) {
        return Inbound::Ignored("addressed to another peer");
    }
    Inbound::Signal(msg)
}

/// WebSocket connection to the signaling relay.
///
/// Frames are written in the order `send` is called; inbound frames are
/// delivered in arrival order on the receiver returned by [`connect`].
/// Once the reader has reported `Disconnected`, `send` fails.
///
/// [`connect`]: RelayClient::connect
#[derive(Clone)]
pub struct RelayClient {
    local: PeerId,
    tx: mpsc::UnboundedSender<Message>,
    closed: Arc<AtomicBool>,
}

impl RelayClient {
    pub async fn connect(
        url: &str,
        local: PeerId,
    ) -> Result<(Self, mpsc::Receiver<RelayEvent>)> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::SignalingTransport(format!("cannot reach {url}: {e}")))?;
        info!("Connected to signaling relay at {} as {}", url, local);

        let (mut sink, mut stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let closed = Arc::new(AtomicBool::new(false));
        // Dropped by the reader when it ends, which stops the writer.
        let (reader_alive, mut reader_gone) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    msg = rx.recv() => msg,
                    _ = &mut reader_gone => None,
                };
                let Some(msg) = msg else { break };
                if let Err(e) = sink.send(msg).await {
                    warn!("Relay write failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_local = local.clone();
        let reader_closed = closed.clone();
        tokio::spawn(async move {
            let _reader_alive = reader_alive;
            let reason = loop {
                let text = match stream.next().await {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => format!("relay closed the connection: {}", frame.reason),
                            None => "relay closed the connection".to_owned(),
                        };
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break e.to_string(),
                    None => break "relay stream ended".to_owned(),
                };

                let event = match classify_frame(&text, &reader_local) {
                    Inbound::Signal(msg) => RelayEvent::Signal(msg),
                    Inbound::Malformed(e) => RelayEvent::Malformed(e),
                    Inbound::Ignored(why) => {
                        debug!("Ignoring relay frame: {}", why);
                        continue;
                    }
                };
                if event_tx.send(event).await.is_err() {
                    debug!("Client loop is gone, stopping relay reader");
                    reader_closed.store(true, Ordering::SeqCst);
                    return;
                }
            };
            reader_closed.store(true, Ordering::SeqCst);
            let _ = event_tx.send(RelayEvent::Disconnected(reason)).await;
        });

        Ok((Self { local, tx, closed }, event_rx))
    }

    pub fn local(&self) -> &PeerId {
        &self.local
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingOutput for RelayClient {
    async fn send(&self, msg: SignalingMessage) -> Result<()> {
        if self.is_closed() {
            return Err(closed());
        }
        let json = encode_frame(&msg)?;
        debug!("Sending {} to {:?}", msg.kind(), msg.recipient());
        self.tx
            .send(Message::Text(json.into()))
            .map_err(|_| closed())
    }
}

fn closed() -> Error {
    Error::SignalingTransport("relay connection is closed".to_owned())
}
