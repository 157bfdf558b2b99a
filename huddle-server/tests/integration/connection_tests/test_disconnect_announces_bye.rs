use huddle_core::{PeerId, SignalingMessage};

use crate::integration::{init_tracing, offer, spawn_relay, wait_for_connections};
use crate::utils::TestPeer;

#[tokio::test]
async fn test_disconnect_announces_bye() {
    init_tracing();

    let (addr, service) = spawn_relay().await;
    let mut alice = TestPeer::connect(addr, "signaling", "alice").await.unwrap();
    let mut bob = TestPeer::connect(addr, "signaling", "bob").await.unwrap();
    wait_for_connections(&service, 2).await;

    alice.send(&offer("alice")).await.unwrap();
    bob.recv().await.unwrap();

    alice.close().await.unwrap();

    let bye = bob.recv().await.expect("Bob should be told alice left");
    assert_eq!(
        bye,
        SignalingMessage::Bye {
            peer_id: PeerId::from("alice"),
            to: None,
        }
    );

    // The identity is free again for a fresh connection.
    let mut alice_again = TestPeer::connect(addr, "signaling", "alice").await.unwrap();
    wait_for_connections(&service, 2).await;
    alice_again.send(&offer("alice")).await.unwrap();
    assert_eq!(bob.recv().await.unwrap(), offer("alice"));
}
