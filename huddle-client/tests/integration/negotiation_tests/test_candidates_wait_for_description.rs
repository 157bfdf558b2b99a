use huddle_client::Negotiator;
use huddle_core::{NegotiationState, SdpType, SessionDescription};

use crate::integration::{candidate, harness, init_tracing, peer};
use crate::utils::MediaCall;

#[tokio::test]
async fn test_candidates_wait_for_answer() {
    init_tracing();

    let alice = harness("alice");
    let mut negotiator = Negotiator::new(alice.ctx.clone(), Some(peer("bob")));
    negotiator.start_call().await.unwrap();

    for n in 1..=3 {
        negotiator
            .handle_candidate(&peer("bob"), Some(candidate(n)))
            .await
            .unwrap();
    }
    assert_eq!(negotiator.buffered_candidates(), 3);
    assert!(alice.media.applied_candidates().await.is_empty());

    negotiator
        .handle_answer(peer("bob"), SessionDescription::answer("v=0 bob"))
        .await
        .unwrap();

    assert_eq!(negotiator.state(), NegotiationState::AnswerReceived);
    assert_eq!(negotiator.buffered_candidates(), 0);
    assert_eq!(
        alice.media.applied_candidates().await,
        vec![candidate(1).candidate, candidate(2).candidate, candidate(3).candidate]
    );

    let calls = alice.media.calls().await;
    let remote_at = calls
        .iter()
        .position(|c| *c == MediaCall::SetRemote(SdpType::Answer))
        .unwrap();
    let first_candidate_at = calls
        .iter()
        .position(|c| matches!(c, MediaCall::AddCandidate(_)))
        .unwrap();
    assert!(remote_at < first_candidate_at);

    // Once the description is in place candidates go straight through.
    negotiator
        .handle_candidate(&peer("bob"), Some(candidate(4)))
        .await
        .unwrap();
    negotiator.handle_candidate(&peer("bob"), None).await.unwrap();
    assert_eq!(negotiator.buffered_candidates(), 0);
    assert_eq!(alice.media.applied_candidates().await.len(), 4);
}

#[tokio::test]
async fn test_candidates_before_offer_are_applied_with_it() {
    init_tracing();

    let bob = harness("bob");
    let mut negotiator = Negotiator::new(bob.ctx.clone(), Some(peer("alice")));

    negotiator
        .handle_candidate(&peer("alice"), Some(candidate(7)))
        .await
        .unwrap();
    assert_eq!(negotiator.state(), NegotiationState::Idle);
    assert_eq!(negotiator.buffered_candidates(), 1);

    negotiator
        .handle_offer(peer("alice"), SessionDescription::offer("v=0 alice"))
        .await
        .unwrap();

    let calls = bob.media.calls().await;
    let remote_at = calls
        .iter()
        .position(|c| *c == MediaCall::SetRemote(SdpType::Offer))
        .unwrap();
    let applied_at = calls
        .iter()
        .position(|c| *c == MediaCall::AddCandidate(candidate(7).candidate))
        .unwrap();
    let answer_at = calls
        .iter()
        .position(|c| *c == MediaCall::CreateAnswer)
        .unwrap();
    assert!(remote_at < applied_at && applied_at < answer_at);
    assert_eq!(negotiator.buffered_candidates(), 0);
}
