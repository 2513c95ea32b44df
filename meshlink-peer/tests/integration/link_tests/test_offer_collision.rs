use meshlink_core::{IceCandidate, SdpType, SessionDescription};
use meshlink_peer::{LinkCommand, LinkReportKind, NegotiationState, PeerLinkHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::integration::{TIMEOUT_MS, create_test_link, init_tracing, session};
use crate::utils::{MediaOp, MockBehavior, MockMediaFactory, SentSignal};

#[tokio::test]
async fn test_polite_side_rolls_back_on_collision() {
    init_tracing();

    let media = MockMediaFactory::default();
    // Lower id is polite.
    let (local, remote) = (session(10), session(20));
    let mut link = create_test_link(local, remote, &media);

    link.handle.send(LinkCommand::Initiate);
    assert!(matches!(link.next_sent().await, Some(SentSignal::Offer { .. })));

    let theirs = SessionDescription::offer("their-offer");
    link.handle.send(LinkCommand::RemoteOffer(theirs.clone()));

    assert_eq!(
        link.next_sent().await,
        Some(SentSignal::Answer {
            to: remote,
            sdp: format!("answer:{local}->{remote}"),
        })
    );
    assert!(
        link.handle
            .wait_for_state(NegotiationState::Stable, Duration::from_millis(TIMEOUT_MS))
            .await
    );
    assert_eq!(
        media.ops(local, remote).await,
        vec![
            MediaOp::CreateOffer,
            MediaOp::SetLocal(SdpType::Offer),
            MediaOp::SetLocal(SdpType::Rollback),
            MediaOp::SetRemote(theirs),
            MediaOp::CreateAnswer,
            MediaOp::SetLocal(SdpType::Answer),
        ]
    );
}

#[tokio::test]
async fn test_impolite_side_ignores_colliding_offer() {
    init_tracing();

    let media = MockMediaFactory::default();
    let (local, remote) = (session(20), session(10));
    let mut link = create_test_link(local, remote, &media);

    link.handle.send(LinkCommand::Initiate);
    assert!(matches!(link.next_sent().await, Some(SentSignal::Offer { .. })));

    link.handle
        .send(LinkCommand::RemoteOffer(SessionDescription::offer("their-offer")));
    link.handle
        .send(LinkCommand::RemoteCandidate(IceCandidate::new("candidate:late")));

    // Our offer survives; the answer to it completes negotiation.
    let answer = SessionDescription::answer("their-answer");
    link.handle.send(LinkCommand::RemoteAnswer(answer.clone()));
    assert!(
        link.handle
            .wait_for_state(NegotiationState::Stable, Duration::from_millis(TIMEOUT_MS))
            .await
    );

    let ops = media
        .wait_for_ops(
            local,
            remote,
            |ops| ops.contains(&MediaOp::AddCandidate("candidate:late".into())),
            TIMEOUT_MS,
        )
        .await;
    assert_eq!(
        ops,
        vec![
            MediaOp::CreateOffer,
            MediaOp::SetLocal(SdpType::Offer),
            MediaOp::SetRemote(answer),
            MediaOp::AddCandidate("candidate:late".into()),
        ]
    );
    assert_eq!(link.signaling.answers().await, 0);
}

#[tokio::test]
async fn test_ignored_offer_tolerance_ends_once_answered() {
    init_tracing();

    let media = MockMediaFactory::new(MockBehavior {
        fail_add_candidate: true,
        ..Default::default()
    });
    let (local, remote) = (session(20), session(10));
    let mut link = create_test_link(local, remote, &media);

    link.handle.send(LinkCommand::Initiate);
    assert!(matches!(link.next_sent().await, Some(SentSignal::Offer { .. })));

    // A candidate of the ignored offer is rejected without harm.
    link.handle
        .send(LinkCommand::RemoteOffer(SessionDescription::offer("their-offer")));
    link.handle
        .send(LinkCommand::RemoteCandidate(IceCandidate::new("candidate:stale")));
    link.handle
        .send(LinkCommand::RemoteAnswer(SessionDescription::answer("their-answer")));
    assert!(
        link.handle
            .wait_for_state(NegotiationState::Stable, Duration::from_millis(TIMEOUT_MS))
            .await
    );
    media
        .wait_for_ops(
            local,
            remote,
            |ops| ops.contains(&MediaOp::AddCandidate("candidate:stale".into())),
            TIMEOUT_MS,
        )
        .await;
    assert!(!link.handle.is_closed());

    // Once negotiated, a rejected candidate is a real failure.
    link.handle
        .send(LinkCommand::RemoteCandidate(IceCandidate::new("candidate:fresh")));
    assert!(matches!(
        link.wait_for_report(|k| matches!(k, LinkReportKind::Failed(_)))
            .await,
        Some(LinkReportKind::Failed(_))
    ));
    assert!(
        link.handle
            .wait_for_state(NegotiationState::Closed, Duration::from_millis(TIMEOUT_MS))
            .await
    );
}

/// Forwards what one link sends into the other link's queue.
fn wire(mut sent: mpsc::UnboundedReceiver<SentSignal>, to: Arc<PeerLinkHandle>) {
    tokio::spawn(async move {
        while let Some(signal) = sent.recv().await {
            let cmd = match signal {
                SentSignal::Offer { sdp, .. } => LinkCommand::RemoteOffer(SessionDescription::offer(sdp)),
                SentSignal::Answer { sdp, .. } => {
                    LinkCommand::RemoteAnswer(SessionDescription::answer(sdp))
                }
                SentSignal::Ice { candidate, .. } => {
                    LinkCommand::RemoteCandidate(IceCandidate::new(candidate))
                }
                SentSignal::Join { .. } | SentSignal::Leave { .. } => continue,
            };
            if !to.send(cmd) {
                break;
            }
        }
    });
}

#[tokio::test]
async fn test_simultaneous_offers_converge() {
    init_tracing();

    for round in 0..10 {
        let media = MockMediaFactory::default();
        let (polite, impolite) = (session(100 + round), session(200 + round));

        let a = create_test_link(polite, impolite, &media);
        let b = create_test_link(impolite, polite, &media);
        let a_handle = Arc::new(a.handle);
        let b_handle = Arc::new(b.handle);

        a_handle.send(LinkCommand::Initiate);
        b_handle.send(LinkCommand::Initiate);
        wire(a.sent, b_handle.clone());
        wire(b.sent, a_handle.clone());

        let timeout = Duration::from_millis(TIMEOUT_MS);
        assert!(a_handle.wait_for_state(NegotiationState::Stable, timeout).await);
        assert!(b_handle.wait_for_state(NegotiationState::Stable, timeout).await);

        // Exactly one answer, always from the polite side.
        assert_eq!(a.signaling.answers().await, 1, "round {round}");
        assert_eq!(b.signaling.answers().await, 0, "round {round}");

        let impolite_ops = media.ops(impolite, polite).await;
        assert!(!impolite_ops.contains(&MediaOp::SetLocal(SdpType::Rollback)));
        assert!(
            media
                .ops(polite, impolite)
                .await
                .contains(&MediaOp::SetLocal(SdpType::Rollback))
        );
    }
}
