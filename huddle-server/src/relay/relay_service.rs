use axum::extract::ws::Message;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_core::{PeerId, SignalingMessage, decode_frame, encode_frame};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub type ConnectionId = u64;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Malformed(#[from] huddle_core::Error),

    #[error("peer id {0} is already bound to another connection")]
    IdentityInUse(PeerId),

    #[error("connection is bound to {bound}, frame claims {claimed}")]
    IdentityMismatch { bound: PeerId, claimed: PeerId },

    #[error("recipient {0} is not connected to this room")]
    UnknownRecipient(PeerId),

    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}

struct Link {
    room: String,
    peer: Option<PeerId>,
    tx: mpsc::UnboundedSender<Message>,
}

struct RelayInner {
    links: DashMap<ConnectionId, Link>,
    identities: DashMap<PeerId, ConnectionId>,
    next_id: AtomicU64,
    max_message_size: usize,
}

/// Connection registry and router shared by every WebSocket task.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                links: DashMap::new(),
                identities: DashMap::new(),
                next_id: AtomicU64::new(1),
                max_message_size,
            }),
        }
    }

    pub fn max_message_size(&self) -> usize {
        self.inner.max_message_size
    }

    pub fn connect(&self, room: &str, tx: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.links.insert(
            id,
            Link {
                room: room.to_owned(),
                peer: None,
                tx,
            },
        );
        debug!(connection = id, room, "Connection registered");
        id
    }

    /// Forget a connection. If it had announced an identity, the rest of the
    /// room receives a `bye` on its behalf.
    pub fn disconnect(&self, conn: ConnectionId) {
        let Some((_, link)) = self.inner.links.remove(&conn) else {
            return;
        };
        let Some(peer) = link.peer else {
            return;
        };

        self.inner
            .identities
            .remove_if(&peer, |_, bound| *bound == conn);
        info!(%peer, room = %link.room, "Peer left the relay");

        let bye = SignalingMessage::Bye {
            peer_id: peer,
            to: None,
        };
        self.broadcast(&link.room, conn, &bye);
    }

    /// Decode and route one inbound text frame. Returns how many connections
    /// received it.
    pub fn route_frame(&self, conn: ConnectionId, text: &str) -> Result<usize, RelayError> {
        let msg = decode_frame(text)?;
        self.route(conn, msg)
    }

    pub fn route(&self, conn: ConnectionId, msg: SignalingMessage) -> Result<usize, RelayError> {
        let room = self.bind(conn, msg.sender())?;

        match msg.recipient() {
            Some(to) => {
                let target = self
                    .inner
                    .identities
                    .get(to)
                    .map(|entry| *entry.value())
                    .filter(|target| self.room_of(*target).as_deref() == Some(room.as_str()))
                    .ok_or_else(|| RelayError::UnknownRecipient(to.clone()))?;
                self.send_to(target, &msg);
                Ok(1)
            }
            None => Ok(self.broadcast(&room, conn, &msg)),
        }
    }

    /// Identities currently bound in `room`.
    pub fn peers_in(&self, room: &str) -> Vec<PeerId> {
        self.inner
            .links
            .iter()
            .filter(|link| link.room == room)
            .filter_map(|link| link.peer.clone())
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.links.len()
    }

    fn room_of(&self, conn: ConnectionId) -> Option<String> {
        self.inner.links.get(&conn).map(|link| link.room.clone())
    }

    /// Bind `claimed` to `conn` on first use and check it afterwards.
    fn bind(&self, conn: ConnectionId, claimed: &PeerId) -> Result<String, RelayError> {
        let (room, bound) = {
            let link = self
                .inner
                .links
                .get(&conn)
                .ok_or(RelayError::UnknownConnection(conn))?;
            (link.room.clone(), link.peer.clone())
        };

        match bound {
            Some(bound) if &bound == claimed => Ok(room),
            Some(bound) => Err(RelayError::IdentityMismatch {
                bound,
                claimed: claimed.clone(),
            }),
            None => {
                match self.inner.identities.entry(claimed.clone()) {
                    Entry::Occupied(entry) if *entry.get() != conn => {
                        return Err(RelayError::IdentityInUse(claimed.clone()));
                    }
                    Entry::Occupied(_) => {}
                    Entry::Vacant(entry) => {
                        entry.insert(conn);
                    }
                }
                if let Some(mut link) = self.inner.links.get_mut(&conn) {
                    link.peer = Some(claimed.clone());
                }
                info!(peer = %claimed, %room, "Peer joined the relay");
                Ok(room)
            }
        }
    }

    fn broadcast(&self, room: &str, from: ConnectionId, msg: &SignalingMessage) -> usize {
        let targets: Vec<ConnectionId> = self
            .inner
            .links
            .iter()
            .filter(|link| *link.key() != from && link.room == room)
            .map(|link| *link.key())
            .collect();

        for target in &targets {
            self.send_to(*target, msg);
        }
        targets.len()
    }

    fn send_to(&self, target: ConnectionId, msg: &SignalingMessage) {
        let json = match encode_frame(msg) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize signaling message: {}", e);
                return;
            }
        };

        if let Some(link) = self.inner.links.get(&target) {
            if let Err(e) = link.tx.send(Message::Text(json.into())) {
                error!("Failed to queue WS message for connection {}: {:?}", target, e);
            }
        } else {
            warn!("Attempted to relay to closed connection {}", target);
        }
    }
}
