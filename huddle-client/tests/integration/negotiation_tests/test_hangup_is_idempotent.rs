use huddle_client::Negotiator;
use huddle_core::{ConnectionState, NegotiationState, SignalingMessage};

use crate::integration::{candidate, harness, init_tracing, peer};

#[tokio::test]
async fn test_hangup_is_idempotent() {
    init_tracing();

    let alice = harness("alice");
    let mut negotiator = Negotiator::new(alice.ctx.clone(), Some(peer("bob")));
    negotiator.start_call().await.unwrap();
    negotiator
        .handle_candidate(&peer("bob"), Some(candidate(1)))
        .await
        .unwrap();
    let first_key = negotiator.key();

    assert!(negotiator.hangup(true).await);
    assert_eq!(negotiator.state(), NegotiationState::Closed);
    assert_eq!(negotiator.connection(), ConnectionState::Closed);
    assert_eq!(negotiator.buffered_candidates(), 0);
    assert_eq!(alice.media.closed().await, 1);
    assert_eq!(alice.signaling.byes_to(&peer("bob")).await, 1);

    assert!(!negotiator.hangup(true).await);
    assert_eq!(alice.media.closed().await, 1);
    assert_eq!(alice.signaling.byes_to(&peer("bob")).await, 1);

    // Frames for the closed session are refused.
    assert!(
        negotiator
            .handle_candidate(&peer("bob"), Some(candidate(2)))
            .await
            .is_err()
    );

    negotiator.start_call().await.unwrap();
    assert_eq!(negotiator.state(), NegotiationState::OfferSent);
    assert_ne!(negotiator.key(), first_key);
    assert_eq!(
        alice.signaling.sent_kinds().await,
        vec!["offer", "bye", "offer"]
    );
}

#[tokio::test]
async fn test_hangup_while_idle_sends_nothing() {
    init_tracing();

    let alice = harness("alice");
    let mut negotiator = Negotiator::new(alice.ctx.clone(), Some(peer("bob")));

    assert!(negotiator.hangup(true).await);
    assert_eq!(negotiator.state(), NegotiationState::Closed);
    assert!(
        !alice
            .signaling
            .sent()
            .await
            .iter()
            .any(|m| matches!(m, SignalingMessage::Bye { .. }))
    );
    assert_eq!(alice.media.closed().await, 0);
}
