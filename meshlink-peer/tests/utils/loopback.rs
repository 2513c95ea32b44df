use async_trait::async_trait;
use meshlink_core::{
    IceCandidate, Participant, RoomId, ServerMessage, SessionDescription, SessionId, Signal,
};
use meshlink_peer::{
    MediaFactory, Mesh, MeshConfig, MeshEvent, MeshHandle, MeshSnapshot, NegotiationState,
    SignalingOutput,
};
use meshlink_server::{RoomManager, SignalingService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// In-process relay: meshes talk to a real `RoomManager` through channels
/// instead of WebSockets.
#[derive(Clone)]
pub struct Loopback {
    pub sessions: SignalingService,
    pub rooms: RoomManager,
}

impl Loopback {
    pub fn new() -> Self {
        let sessions = SignalingService::new();
        let rooms = RoomManager::new(Arc::new(sessions.clone()));
        Self { sessions, rooms }
    }

    /// Connects a session and returns the stream of frames the relay sends it.
    pub fn connect(&self, session: SessionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.add_session(session, tx);
        rx
    }

    /// Connects a session and starts a mesh on it.
    pub fn join(
        &self,
        session: SessionId,
        config: MeshConfig,
        media: Arc<dyn MediaFactory>,
    ) -> TestPeer {
        let mut inbound = self.connect(session);
        let signaling = Arc::new(LoopbackSignaling {
            session,
            rooms: self.rooms.clone(),
        });

        let room = config.room_id.clone();
        let (mesh, events) = Mesh::spawn(session, config, media, signaling);
        let mesh = Arc::new(mesh);

        let pump = tokio::spawn({
            let mesh = mesh.clone();
            async move {
                while let Some(msg) = inbound.recv().await {
                    if !mesh.deliver(msg) {
                        break;
                    }
                }
            }
        });

        TestPeer {
            session,
            room,
            mesh: Some(mesh),
            events,
            seen: Vec::new(),
            pump: Some(pump),
            relay: self.clone(),
        }
    }
}

struct LoopbackSignaling {
    session: SessionId,
    rooms: RoomManager,
}

impl LoopbackSignaling {
    fn route(&self, room: &RoomId, to: SessionId, signal: Signal) {
        let _ = self
            .rooms
            .signal(room, self.session, to, signal.into_envelope(None));
    }
}

#[async_trait]
impl SignalingOutput for LoopbackSignaling {
    async fn send_offer(&self, room: &RoomId, to: SessionId, offer: SessionDescription) {
        self.route(room, to, Signal::Offer(offer));
    }

    async fn send_answer(&self, room: &RoomId, to: SessionId, answer: SessionDescription) {
        self.route(room, to, Signal::Answer(answer));
    }

    async fn send_ice(&self, room: &RoomId, to: SessionId, candidate: IceCandidate) {
        self.route(room, to, Signal::Candidate(candidate));
    }

    async fn join_room(&self, room: &RoomId, user_id: Option<String>) {
        let participant = Participant {
            session_id: self.session,
            user_id,
        };
        let _ = self.rooms.join(room, participant).await;
    }

    async fn leave_room(&self, room: &RoomId) {
        let _ = self.rooms.leave(room, self.session).await;
    }
}

/// A mesh running against a [`Loopback`] relay.
pub struct TestPeer {
    pub session: SessionId,
    room: RoomId,
    mesh: Option<Arc<MeshHandle>>,
    events: mpsc::UnboundedReceiver<MeshEvent>,
    seen: Vec<MeshEvent>,
    pump: Option<JoinHandle<()>>,
    relay: Loopback,
}

impl TestPeer {
    pub fn mesh(&self) -> &MeshHandle {
        self.mesh.as_deref().expect("mesh already stopped")
    }

    pub async fn snapshot(&self) -> MeshSnapshot {
        self.mesh().snapshot().await
    }

    /// Waits for a matching event, keeping everything seen on the way.
    pub async fn wait_for_event<F>(&mut self, predicate: F, timeout_ms: u64) -> Option<MeshEvent>
    where
        F: Fn(&MeshEvent) -> bool,
    {
        if let Some(found) = self.seen.iter().find(|e| predicate(e)) {
            return Some(found.clone());
        }

        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .ok()??;
            self.seen.push(event.clone());
            if predicate(&event) {
                return Some(event);
            }
        }
    }

    /// Every event received so far, after draining anything pending.
    pub fn events(&mut self) -> &[MeshEvent] {
        while let Ok(event) = self.events.try_recv() {
            self.seen.push(event);
        }
        &self.seen
    }

    pub async fn wait_for_link_state(
        &self,
        peer: SessionId,
        state: NegotiationState,
        timeout_ms: u64,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        while tokio::time::Instant::now() < deadline {
            if self.snapshot().await.links.get(&peer) == Some(&state) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Explicit leave: the mesh leaves the room and closes its links.
    pub async fn leave(&mut self) {
        self.stop_pump().await;
        if let Some(mesh) = self.take_mesh() {
            mesh.shutdown().await;
        }
        self.relay.sessions.remove_session(&self.session);
    }

    /// Transport failure: the relay drops the session the way it does when a
    /// socket dies, and the mesh learns that its connection is gone.
    pub async fn disconnect(&mut self) {
        self.stop_pump().await;
        let _ = self.relay.rooms.leave(&self.room, self.session).await;
        self.relay.sessions.remove_session(&self.session);

        if let Some(mesh) = self.take_mesh() {
            mesh.transport_lost().await;
        }
    }

    async fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            let _ = pump.await;
        }
    }

    /// Only valid once the pump, which holds the other reference, has stopped.
    fn take_mesh(&mut self) -> Option<MeshHandle> {
        self.mesh.take().and_then(|m| Arc::try_unwrap(m).ok())
    }
}
