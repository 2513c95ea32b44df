use meshlink_core::{Participant, RoomId, SessionId};

use crate::integration::{create_test_manager, init_tracing};
use crate::utils::offer_envelope;

#[tokio::test]
async fn test_signal_to_non_member_is_dropped() {
    init_tracing();

    let (manager, signaling, _rx) = create_test_manager();
    let room = RoomId::from("closed");

    let a = Participant::new(SessionId::new());
    let outsider = SessionId::new();
    manager.join(&room, a.clone()).await.unwrap();

    manager
        .signal(&room, a.session_id, outsider, offer_envelope("v=0"))
        .unwrap();
    manager
        .signal(&room, outsider, a.session_id, offer_envelope("v=0"))
        .unwrap();
    manager
        .signal(&room, a.session_id, a.session_id, offer_envelope("v=0"))
        .unwrap();

    // Snapshot is processed after the signals, so all of them have been handled.
    manager.members(&room).await.unwrap();

    assert!(signaling.messages_for(&outsider).await.is_empty());
    // Only the initial membership snapshot reached A.
    assert_eq!(signaling.messages_for(&a.session_id).await.len(), 1);
}

#[tokio::test]
async fn test_signal_to_unknown_room_is_dropped() {
    init_tracing();

    let (manager, signaling, _rx) = create_test_manager();

    manager
        .signal(
            &RoomId::from("ghost"),
            SessionId::new(),
            SessionId::new(),
            offer_envelope("v=0"),
        )
        .unwrap();

    assert_eq!(manager.room_count(), 0);
    assert_eq!(signaling.total().await, 0);
}
