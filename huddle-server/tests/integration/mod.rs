pub mod connection_tests;

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::Level;

use huddle_core::{IceCandidate, PeerId, SessionDescription, SignalingMessage};
use huddle_server::{RelayService, serve_on};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn spawn_relay() -> (SocketAddr, RelayService) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind relay listener");
    let addr = listener.local_addr().expect("No local addr");
    let service = RelayService::new(64 * 1024);

    tokio::spawn(serve_on(listener, service.clone()));

    (addr, service)
}

/// The relay registers a socket only after the upgrade completes, so tests
/// wait for it before sending.
pub async fn wait_for_connections(service: &RelayService, count: usize) {
    for _ in 0..100 {
        if service.connection_count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "Expected {} relay connections, have {}",
        count,
        service.connection_count()
    );
}

pub fn offer(from: &str) -> SignalingMessage {
    SignalingMessage::Offer {
        sdp: SessionDescription::offer(format!("v=0\r\no={from} 1 1 IN IP4 0.0.0.0\r\n")),
        peer_id: PeerId::from(from),
        to: None,
    }
}

pub fn answer(from: &str, to: &str) -> SignalingMessage {
    SignalingMessage::Answer {
        sdp: SessionDescription::answer(format!("v=0\r\no={from} 1 1 IN IP4 0.0.0.0\r\n")),
        peer_id: PeerId::from(from),
        to: Some(PeerId::from(to)),
    }
}

pub fn candidate(from: &str, n: usize) -> SignalingMessage {
    SignalingMessage::Candidate {
        candidate: Some(IceCandidate::new(format!(
            "candidate:{n} 1 udp 2122260223 10.0.0.1 {} typ host",
            50000 + n
        ))),
        peer_id: PeerId::from(from),
        to: None,
    }
}
