use futures::SinkExt;
use huddle_client::{RelayClient, RelayEvent, SignalingOutput};
use huddle_core::{Error, PeerId, SessionDescription, SignalingMessage};
use huddle_server::RelayService;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::integration::{EVENT_TIMEOUT, init_tracing, peer};
use crate::utils::scripted_relay;

async fn next_event(rx: &mut mpsc::Receiver<RelayEvent>) -> Option<RelayEvent> {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for relay event")
}

async fn wait_for_peer(service: &RelayService, room: &str, id: &PeerId) {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while !service.peers_in(room).contains(id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peer never bound its identity");
}

fn hello(from: &str) -> SignalingMessage {
    SignalingMessage::Candidate {
        candidate: None,
        peer_id: peer(from),
        to: None,
    }
}

#[tokio::test]
async fn test_relay_client_over_relay_server() {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = RelayService::new(4 * 1024);
    tokio::spawn(huddle_server::serve_on(listener, service.clone()));

    let url = format!("ws://{addr}/ws/adapter");
    let (alice, mut alice_rx) = RelayClient::connect(&url, peer("alice")).await.unwrap();
    alice.send(hello("alice")).await.unwrap();
    wait_for_peer(&service, "adapter", &peer("alice")).await;

    let (mut bob, _) = connect_async(url.as_str()).await.unwrap();
    for frame in [
        r#"{"type":"bogus","peerId":"bob"}"#,
        r#"{"type":"candidate","candidate":null,"peerId":"bob","to":"alice"}"#,
    ] {
        bob.send(Message::Text(frame.to_owned().into())).await.unwrap();
    }

    // The relay drops the bogus frame; the addressed one comes through.
    match next_event(&mut alice_rx).await {
        Some(RelayEvent::Signal(SignalingMessage::Candidate { peer_id, to, .. })) => {
            assert_eq!(peer_id, peer("bob"));
            assert_eq!(to, Some(peer("alice")));
        }
        other => panic!("expected bob's candidate, got {other:?}"),
    }

    // A frame over the relay's size limit makes it drop the connection.
    let oversized = SignalingMessage::Offer {
        sdp: SessionDescription::offer("a".repeat(16 * 1024)),
        peer_id: peer("alice"),
        to: None,
    };
    alice.send(oversized).await.unwrap();

    assert!(matches!(
        next_event(&mut alice_rx).await,
        Some(RelayEvent::Disconnected(_))
    ));
    assert!(next_event(&mut alice_rx).await.is_none());

    assert!(alice.is_closed());
    assert!(matches!(
        alice.send(hello("alice")).await,
        Err(Error::SignalingTransport(_))
    ));
}

#[tokio::test]
async fn test_relay_client_filters_inbound_frames() {
    init_tracing();

    let frames = [
        r#"{"type":"bye","peerId":"alice"}"#,
        r#"{"type":"bye","peerId":"bob","to":"carol"}"#,
        r#"{"type":"bogus"}"#,
        r#"{"type":"bye","peerId":"bob"}"#,
    ];
    let addr = scripted_relay(frames.iter().map(|f| f.to_string()).collect())
        .await
        .unwrap();

    let (alice, mut rx) = RelayClient::connect(&format!("ws://{addr}/ws/script"), peer("alice"))
        .await
        .unwrap();

    // Own echo and the frame for carol never show up.
    assert!(matches!(
        next_event(&mut rx).await,
        Some(RelayEvent::Malformed(Error::MalformedMessage(_)))
    ));
    match next_event(&mut rx).await {
        Some(RelayEvent::Signal(SignalingMessage::Bye { peer_id, .. })) => {
            assert_eq!(peer_id, peer("bob"));
        }
        other => panic!("expected bob's bye, got {other:?}"),
    }
    assert!(matches!(
        next_event(&mut rx).await,
        Some(RelayEvent::Disconnected(_))
    ));
    assert!(next_event(&mut rx).await.is_none());

    assert!(matches!(
        alice.send(hello("alice")).await,
        Err(Error::SignalingTransport(_))
    ));
}
