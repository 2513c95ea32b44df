use crate::error::RelayError;
use crate::room::room::{RoomHandle, snapshot_command};
use crate::room::{JoinOutcome, LeaveOutcome, MembershipEvent, Room, RoomCommand};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use meshlink_core::{Participant, RoomId, SessionId, SignalEnvelope};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

const MEMBERSHIP_EVENT_CAPACITY: usize = 256;

/// Registry of live rooms. Rooms are created on first join and remove
/// themselves once their last member leaves.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    signaling: Arc<dyn SignalingOutput>,
    events: broadcast::Sender<MembershipEvent>,
    generations: Arc<AtomicU64>,
}

impl RoomManager {
    pub fn new(signaling: Arc<dyn SignalingOutput>) -> Self {
        let (events, _) = broadcast::channel(MEMBERSHIP_EVENT_CAPACITY);

        Self {
            rooms: Arc::new(DashMap::new()),
            signaling,
            events,
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stream of membership changes across all rooms.
    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.events.subscribe()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub async fn join(
        &self,
        room_id: &RoomId,
        participant: Participant,
    ) -> Result<JoinOutcome, RelayError> {
        let (reply, rx) = oneshot::channel();
        let cmd = RoomCommand::Join {
            participant,
            reply: Some(reply),
        };

        let entry = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| self.spawn_room(room_id.clone()));

        if entry.tx.send(cmd).is_err() {
            drop(entry);
            self.evict_stale(room_id);
            return Err(RelayError::RoomClosed(room_id.clone()));
        }
        drop(entry);

        rx.await.map_err(|_| RelayError::NoReply(room_id.clone()))
    }

    /// Leaving a room that does not exist is a no-op.
    pub async fn leave(
        &self,
        room_id: &RoomId,
        session_id: SessionId,
    ) -> Result<LeaveOutcome, RelayError> {
        let (reply, rx) = oneshot::channel();
        let cmd = RoomCommand::Leave {
            session_id,
            reply: Some(reply),
        };

        if !self.submit_existing(room_id, cmd)? {
            return Ok(LeaveOutcome {
                was_member: false,
                remaining_members: Vec::new(),
            });
        }

        rx.await.map_err(|_| RelayError::NoReply(room_id.clone()))
    }

    /// Forwards a directed signal. Membership of both ends is checked by the
    /// room itself; signals for unknown rooms are dropped.
    pub fn signal(
        &self,
        room_id: &RoomId,
        from: SessionId,
        to: SessionId,
        envelope: SignalEnvelope,
    ) -> Result<(), RelayError> {
        let kind = envelope.kind;
        let cmd = RoomCommand::Signal { from, to, envelope };

        if !self.submit_existing(room_id, cmd)? {
            warn!(
                "Dropping {:?} signal from {} for unknown room '{}'",
                kind, from, room_id
            );
        }
        Ok(())
    }

    pub async fn members(&self, room_id: &RoomId) -> Result<Vec<Participant>, RelayError> {
        let (cmd, rx) = snapshot_command();

        if !self.submit_existing(room_id, cmd)? {
            return Ok(Vec::new());
        }

        rx.await.map_err(|_| RelayError::NoReply(room_id.clone()))
    }

    /// Sends to a live room while holding its registry entry. Returns
    /// `Ok(false)` when no such room exists.
    fn submit_existing(&self, room_id: &RoomId, cmd: RoomCommand) -> Result<bool, RelayError> {
        let Some(handle) = self.rooms.get(room_id) else {
            return Ok(false);
        };

        if handle.tx.send(cmd).is_err() {
            drop(handle);
            self.evict_stale(room_id);
            return Err(RelayError::RoomClosed(room_id.clone()));
        }
        Ok(true)
    }

    fn spawn_room(&self, room_id: RoomId) -> RoomHandle {
        info!("Creating new room: {}", room_id);

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let room = Room::new(
            room_id,
            generation,
            rx,
            self.signaling.clone(),
            self.events.clone(),
            self.rooms.clone(),
        );
        tokio::spawn(room.run());

        RoomHandle { tx, generation }
    }

    fn evict_stale(&self, room_id: &RoomId) {
        if self
            .rooms
            .remove_if(room_id, |_, handle| handle.tx.is_closed())
            .is_some()
        {
            debug!("Evicted stopped room '{}'", room_id);
        }
    }
}
