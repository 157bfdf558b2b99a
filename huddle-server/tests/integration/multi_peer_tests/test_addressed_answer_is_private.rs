use crate::integration::{answer, init_tracing, offer, spawn_relay, wait_for_connections};
use crate::utils::TestPeer;

#[tokio::test]
async fn test_addressed_answer_is_private() {
    init_tracing();

    let (addr, service) = spawn_relay().await;
    let mut alice = TestPeer::connect(addr, "signaling", "alice").await.unwrap();
    let mut bob = TestPeer::connect(addr, "signaling", "bob").await.unwrap();
    let mut carol = TestPeer::connect(addr, "signaling", "carol").await.unwrap();
    wait_for_connections(&service, 3).await;

    alice.send(&offer("alice")).await.unwrap();
    assert_eq!(bob.recv().await.unwrap(), offer("alice"));
    assert_eq!(carol.recv().await.unwrap(), offer("alice"));

    bob.send(&answer("bob", "alice")).await.unwrap();

    assert_eq!(alice.recv().await.unwrap(), answer("bob", "alice"));
    carol.expect_silence().await.unwrap();
}
