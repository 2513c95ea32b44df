use crate::room::membership::RoomMembers;
use crate::room::membership_event::MembershipEvent;
use crate::room::room_command::RoomCommand;
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use meshlink_core::{Participant, RoomId, ServerMessage, SessionId, SignalEnvelope};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

/// Entry kept by the manager for every live room.
pub(crate) struct RoomHandle {
    pub(crate) tx: mpsc::UnboundedSender<RoomCommand>,
    pub(crate) generation: u64,
}

/// A single room. Owns its membership and applies commands strictly one at a
/// time, so every join/leave and the messages and events it produces happen as
/// one step with respect to everything else in the room.
pub struct Room {
    id: RoomId,
    generation: u64,
    members: RoomMembers,
    command_rx: mpsc::UnboundedReceiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
    events: broadcast::Sender<MembershipEvent>,
    registry: Arc<DashMap<RoomId, RoomHandle>>,
}

impl Room {
    pub(crate) fn new(
        id: RoomId,
        generation: u64,
        command_rx: mpsc::UnboundedReceiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
        events: broadcast::Sender<MembershipEvent>,
        registry: Arc<DashMap<RoomId, RoomHandle>>,
    ) -> Self {
        Self {
            id,
            generation,
            members: RoomMembers::new(),
            command_rx,
            signaling,
            events,
            registry,
        }
    }

    pub async fn run(mut self) {
        info!("Room '{}' event loop started", self.id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;

            if self.members.is_empty() && self.try_retire() {
                break;
            }
        }

        info!("Room '{}' event loop finished", self.id);
    }

    /// Removes the room from the registry if nothing is queued behind the
    /// command that emptied it. Submissions happen under the registry entry
    /// lock, so the queue check and the removal cannot interleave with a send.
    fn try_retire(&self) -> bool {
        let generation = self.generation;
        let pending = &self.command_rx;

        self.registry
            .remove_if(&self.id, |_, handle| {
                handle.generation == generation && pending.is_empty()
            })
            .is_some()
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { participant, reply } => {
                let outcome = self.members.join(participant.clone());

                if outcome.is_new {
                    info!(
                        "Session {} joined room '{}' ({} members)",
                        participant.session_id,
                        self.id,
                        self.members.len()
                    );

                    for member in &outcome.existing_members {
                        self.signaling
                            .deliver(
                                &member.session_id,
                                ServerMessage::PeerJoined {
                                    room_id: self.id.clone(),
                                    peer: participant.clone(),
                                },
                            )
                            .await;
                    }

                    let _ = self.events.send(MembershipEvent::MemberJoined {
                        room_id: self.id.clone(),
                        participant: participant.clone(),
                    });
                } else {
                    debug!(
                        "Session {} re-joined room '{}', resending membership",
                        participant.session_id, self.id
                    );
                }

                self.signaling
                    .deliver(
                        &participant.session_id,
                        ServerMessage::Peers {
                            room_id: self.id.clone(),
                            peers: outcome.existing_members.clone(),
                        },
                    )
                    .await;

                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }

            RoomCommand::Leave { session_id, reply } => {
                let departed = self.members.get(&session_id).cloned();
                let outcome = self.members.leave(&session_id);

                if let Some(participant) = departed {
                    info!(
                        "Session {} left room '{}' ({} members)",
                        session_id,
                        self.id,
                        self.members.len()
                    );
                    self.announce_departure(participant).await;
                }

                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }

            RoomCommand::Signal { from, to, envelope } => {
                self.route_signal(from, to, envelope).await;
            }

            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.members.list().to_vec());
            }
        }
    }

    async fn announce_departure(&self, participant: Participant) {
        for member in self.members.list() {
            self.signaling
                .deliver(
                    &member.session_id,
                    ServerMessage::PeerLeft {
                        room_id: self.id.clone(),
                        peer_id: participant.session_id,
                    },
                )
                .await;
        }

        let _ = self.events.send(MembershipEvent::MemberLeft {
            room_id: self.id.clone(),
            participant,
        });
    }

    async fn route_signal(&self, from: SessionId, to: SessionId, envelope: SignalEnvelope) {
        if from == to {
            warn!("Dropping {:?} signal addressed to its own sender {}", envelope.kind, from);
            return;
        }
        if !self.members.contains(&from) {
            warn!(
                "Dropping {:?} signal from non-member {} in room '{}'",
                envelope.kind, from, self.id
            );
            return;
        }
        if !self.members.contains(&to) {
            warn!(
                "Dropping {:?} signal from {} to non-member {} in room '{}'",
                envelope.kind, from, to, self.id
            );
            return;
        }

        debug!("Forwarding {:?} {} -> {} in room '{}'", envelope.kind, from, to, self.id);

        self.signaling
            .deliver(
                &to,
                ServerMessage::Signal {
                    room_id: self.id.clone(),
                    from,
                    envelope,
                },
            )
            .await;
    }
}

pub(crate) fn snapshot_command() -> (RoomCommand, oneshot::Receiver<Vec<Participant>>) {
    let (reply, rx) = oneshot::channel();
    (RoomCommand::Snapshot { reply }, rx)
}
