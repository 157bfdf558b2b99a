use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use huddle_core::{PeerId, SignalingMessage, decode_frame, encode_frame};

/// Timeout for a single expected frame (ms).
pub const FRAME_TIMEOUT_MS: u64 = 2000;

/// How long a peer must stay quiet to count as "received nothing" (ms).
pub const SILENCE_MS: u64 = 200;

/// Raw WebSocket participant speaking the relay wire format.
pub struct TestPeer {
    pub peer_id: PeerId,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestPeer {
    pub async fn connect(addr: SocketAddr, room: &str, peer_id: &str) -> Result<Self> {
        let url = format!("ws://{}/ws/{}", addr, room);
        let (ws, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;

        Ok(Self {
            peer_id: PeerId::from(peer_id),
            ws,
        })
    }

    pub async fn send(&mut self, msg: &SignalingMessage) -> Result<()> {
        let text = encode_frame(msg)?;
        self.send_raw(&text).await
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.ws
            .send(Message::Text(text.to_owned().into()))
            .await
            .context("Failed to send frame")
    }

    /// Wait for the next signaling frame.
    pub async fn recv(&mut self) -> Result<SignalingMessage> {
        let deadline = Duration::from_millis(FRAME_TIMEOUT_MS);

        loop {
            let next = tokio::time::timeout(deadline, self.ws.next())
                .await
                .context("Timeout waiting for frame")?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(decode_frame(text.as_str())?),
                Some(Ok(Message::Close(_))) | None => bail!("Relay closed the connection"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => bail!("WebSocket error: {e}"),
            }
        }
    }

    /// Succeeds if no frame arrives within [`SILENCE_MS`].
    pub async fn expect_silence(&mut self) -> Result<()> {
        match tokio::time::timeout(Duration::from_millis(SILENCE_MS), self.ws.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(Message::Text(text)))) => bail!("Unexpected frame: {}", text.as_str()),
            Ok(other) => bail!("Unexpected event: {other:?}"),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await.context("Failed to close")
    }
}
