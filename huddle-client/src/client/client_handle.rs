use crate::client::ClientCommand;
use crate::negotiation::SessionSnapshot;
use huddle_core::{Error, PeerId, Result};
use tokio::sync::{mpsc, oneshot};

/// Cloneable front door to a running [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<ClientCommand>,
}

impl ClientHandle {
    pub(crate) fn new(tx: mpsc::Sender<ClientCommand>) -> Self {
        Self { tx }
    }

    pub async fn call(&self, to: Option<PeerId>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(ClientCommand::Call { to, reply }, rx).await?
    }

    pub async fn hangup(&self, peer: Option<PeerId>) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.request(ClientCommand::Hangup { peer, reply }, rx).await
    }

    pub async fn send_chat(&self, to: Option<PeerId>, text: impl Into<String>) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        let cmd = ClientCommand::Chat {
            to,
            text: text.into(),
            reply,
        };
        self.request(cmd, rx).await?
    }

    pub async fn sessions(&self) -> Result<Vec<SessionSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.request(ClientCommand::Sessions { reply }, rx).await
    }

    /// Ask the loop to hang up everything and stop.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(ClientCommand::Shutdown).await;
    }

    async fn request<T>(&self, cmd: ClientCommand, rx: oneshot::Receiver<T>) -> Result<T> {
        self.tx.send(cmd).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }
}

fn stopped() -> Error {
    Error::SignalingTransport("client loop has stopped".to_owned())
}
