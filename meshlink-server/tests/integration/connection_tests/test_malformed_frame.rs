use meshlink_core::{ClientMessage, RoomId, ServerMessage};
use meshlink_server::RelayConfig;

use crate::integration::{init_tracing, spawn_test_relay};
use crate::utils::TestClient;

#[tokio::test]
async fn test_malformed_frame_gets_error_and_connection_survives() {
    init_tracing();

    let (addr, _state) = spawn_test_relay(RelayConfig::default()).await;
    let mut client = TestClient::connect(addr).await.expect("Failed to connect");

    client
        .send_raw(r#"{"op":"teleport","d":{}}"#)
        .await
        .expect("Send failed");
    assert!(matches!(
        client.recv().await.expect("No reply"),
        ServerMessage::Error { .. }
    ));

    client.send_raw("not json").await.expect("Send failed");
    assert!(matches!(
        client.recv().await.expect("No reply"),
        ServerMessage::Error { .. }
    ));

    client
        .send(&ClientMessage::JoinRoom {
            room_id: RoomId::from("still-alive"),
            user_id: None,
        })
        .await
        .expect("Join failed");
    assert!(matches!(
        client.recv().await.expect("No reply"),
        ServerMessage::Peers { .. }
    ));
}

#[tokio::test]
async fn test_signal_outside_joined_room_is_dropped() {
    init_tracing();

    let (addr, _state) = spawn_test_relay(RelayConfig::default()).await;
    let mut client = TestClient::connect(addr).await.expect("Failed to connect");

    client
        .send_raw(&format!(
            r#"{{"op":"signal","d":{{"roomId":"r","to":"{}","type":"offer"}}}}"#,
            client.session_id
        ))
        .await
        .expect("Send failed");

    client.expect_silence(200).await.expect("Relay replied");
}
