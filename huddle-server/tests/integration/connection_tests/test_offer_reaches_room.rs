use crate::integration::{init_tracing, offer, spawn_relay, wait_for_connections};
use crate::utils::TestPeer;

#[tokio::test]
async fn test_offer_reaches_room() {
    init_tracing();

    let (addr, service) = spawn_relay().await;
    let mut alice = TestPeer::connect(addr, "signaling", "alice").await.unwrap();
    let mut bob = TestPeer::connect(addr, "signaling", "bob").await.unwrap();
    let mut stranger = TestPeer::connect(addr, "other-room", "stranger")
        .await
        .unwrap();
    wait_for_connections(&service, 3).await;

    alice.send(&offer("alice")).await.unwrap();

    let received = bob.recv().await.expect("Bob should receive the offer");
    assert_eq!(received, offer("alice"));

    // The sender never hears its own frame back.
    alice.expect_silence().await.unwrap();
    stranger.expect_silence().await.unwrap();

    assert_eq!(service.peers_in("signaling"), vec![alice.peer_id.clone()]);
}
