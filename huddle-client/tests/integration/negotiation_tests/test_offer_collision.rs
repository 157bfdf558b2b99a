use huddle_client::Negotiator;
use huddle_core::{Error, NegotiationRole, NegotiationState, SessionDescription};

use crate::integration::{candidate, harness, init_tracing, peer};

#[tokio::test]
async fn test_smaller_peer_yields() {
    init_tracing();

    let alice = harness("alice");
    let mut negotiator = Negotiator::new(alice.ctx.clone(), Some(peer("bob")));
    negotiator.start_call().await.unwrap();

    negotiator
        .handle_offer(peer("bob"), SessionDescription::offer("v=0 bob"))
        .await
        .unwrap();

    assert_eq!(negotiator.state(), NegotiationState::AnswerSent);
    assert_eq!(negotiator.role(), NegotiationRole::Responder);
    assert_eq!(alice.media.opened().await, 2);
    assert_eq!(alice.media.closed().await, 1);
    assert_eq!(alice.signaling.sent_kinds().await, vec!["offer", "answer"]);
}

#[tokio::test]
async fn test_larger_peer_keeps_its_offer() {
    init_tracing();

    let bob = harness("bob");
    let mut negotiator = Negotiator::new(bob.ctx.clone(), Some(peer("alice")));
    negotiator.start_call().await.unwrap();

    let err = negotiator
        .handle_offer(peer("alice"), SessionDescription::offer("v=0 alice"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidStateTransition {
            state: NegotiationState::OfferSent,
            event: "offer",
            ..
        }
    ));
    assert_eq!(negotiator.state(), NegotiationState::OfferSent);
    assert_eq!(negotiator.role(), NegotiationRole::Initiator);
    assert_eq!(bob.media.closed().await, 0);
    assert_eq!(bob.signaling.sent_kinds().await, vec!["offer"]);
}

#[tokio::test]
async fn test_larger_peer_forgets_candidates_of_abandoned_offer() {
    init_tracing();

    let bob = harness("bob");
    let mut negotiator = Negotiator::new(bob.ctx.clone(), Some(peer("alice")));
    negotiator.start_call().await.unwrap();

    // Candidates of alice's own offer, which she is about to give up.
    for n in 1..=2 {
        negotiator
            .handle_candidate(&peer("alice"), Some(candidate(n)))
            .await
            .unwrap();
    }
    assert_eq!(negotiator.buffered_candidates(), 2);

    negotiator
        .handle_offer(peer("alice"), SessionDescription::offer("v=0 alice"))
        .await
        .unwrap_err();
    assert_eq!(negotiator.buffered_candidates(), 0);

    // Alice yielded: her answer session's candidates are the ones applied.
    negotiator
        .handle_candidate(&peer("alice"), Some(candidate(3)))
        .await
        .unwrap();
    negotiator
        .handle_answer(peer("alice"), SessionDescription::answer("v=0 alice"))
        .await
        .unwrap();

    assert_eq!(negotiator.state(), NegotiationState::AnswerReceived);
    assert_eq!(
        bob.media.applied_candidates().await,
        vec![candidate(3).candidate]
    );
}
