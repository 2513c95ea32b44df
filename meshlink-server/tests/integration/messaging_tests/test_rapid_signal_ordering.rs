use meshlink_core::{Participant, RoomId, ServerMessage, SessionId};

use crate::integration::{create_test_manager, init_tracing};
use crate::utils::{RELAY_TIMEOUT_MS, candidate_envelope, candidate_index};

#[tokio::test]
async fn test_rapid_candidates_arrive_in_send_order() {
    init_tracing();

    let (manager, signaling, _rx) = create_test_manager();
    let room = RoomId::from("trickle");

    let a = Participant::new(SessionId::new());
    let b = Participant::new(SessionId::new());
    manager.join(&room, a.clone()).await.unwrap();
    manager.join(&room, b.clone()).await.unwrap();

    const COUNT: usize = 200;
    for n in 0..COUNT {
        manager
            .signal(&room, a.session_id, b.session_id, candidate_envelope(n))
            .unwrap();
    }

    // One `peers` frame, then every candidate.
    let to_b = signaling
        .wait_for_messages(&b.session_id, COUNT + 1, RELAY_TIMEOUT_MS)
        .await;

    let order: Vec<usize> = to_b
        .iter()
        .filter_map(|m| match m {
            ServerMessage::Signal { from, envelope, .. } => {
                assert_eq!(*from, a.session_id);
                candidate_index(envelope)
            }
            _ => None,
        })
        .collect();

    assert_eq!(order, (0..COUNT).collect::<Vec<_>>());
}
