use async_trait::async_trait;
use meshlink_core::{IceCandidate, RoomId, SessionDescription, SessionId};

/// Outbound half of the relay connection as seen by links and the mesh.
/// Delivery failures are logged by the implementation; transport loss reaches
/// the mesh through its inbound stream closing.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_offer(&self, room: &RoomId, to: SessionId, offer: SessionDescription);

    async fn send_answer(&self, room: &RoomId, to: SessionId, answer: SessionDescription);

    async fn send_ice(&self, room: &RoomId, to: SessionId, candidate: IceCandidate);

    /// Joins the room. Sent again to re-sync membership after a link failure.
    async fn join_room(&self, room: &RoomId, user_id: Option<String>);

    async fn leave_room(&self, room: &RoomId);
}
