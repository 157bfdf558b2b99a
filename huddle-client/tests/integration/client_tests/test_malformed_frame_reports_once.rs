use huddle_client::{Client, ClientConfig, ClientEvent, RelayEvent};
use huddle_core::{Error, PeerId, decode_frame};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::integration::{expect_event, init_tracing};
use crate::utils::{MockMedia, MockSignalingOutput};

#[tokio::test]
async fn test_malformed_frame_reports_once() {
    init_tracing();

    let media = MockMedia::new();
    let (signaling, _signals) = MockSignalingOutput::new();
    let (relay_tx, relay_rx) = mpsc::channel(8);
    let config = ClientConfig::new("ws://relay.invalid/ws/test").with_peer_id(PeerId::from("alice"));

    let (client, handle, mut events) =
        Client::new(&config, Arc::new(media.clone()), Arc::new(signaling.clone()), relay_rx);
    tokio::spawn(client.run());

    let err = decode_frame(r#"{"type":"bogus","peerId":"bob"}"#).unwrap_err();
    relay_tx.send(RelayEvent::Malformed(err)).await.unwrap();

    let event = expect_event(&mut events, |_| true).await;
    assert!(matches!(
        event,
        ClientEvent::Error(Error::MalformedMessage(_))
    ));

    // The loop is still serving commands, nothing else was emitted and no
    // session was touched.
    assert!(handle.sessions().await.unwrap().is_empty());
    assert!(events.try_recv().is_err());
    assert!(media.calls().await.is_empty());
    assert!(signaling.sent().await.is_empty());

    handle.shutdown().await;
}
