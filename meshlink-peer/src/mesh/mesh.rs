use crate::error::ProtocolError;
use crate::link::{
    LinkCommand, LinkContext, LinkReport, LinkReportKind, NegotiationState, PeerLinkHandle,
};
use crate::media::{ConnectionState, MediaFactory};
use crate::mesh::{MeshConfig, MeshEvent};
use crate::signaling::SignalingOutput;
use meshlink_core::{Participant, ServerMessage, SessionId, Signal, SignalEnvelope, is_polite};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum MeshCommand {
    Relay(ServerMessage),
    Snapshot(oneshot::Sender<MeshSnapshot>),
    TransportLost,
    Shutdown,
}

/// Point-in-time view of a mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshSnapshot {
    pub members: Vec<Participant>,
    pub links: BTreeMap<SessionId, NegotiationState>,
}

pub struct MeshHandle {
    local: SessionId,
    commands: mpsc::UnboundedSender<MeshCommand>,
    task: JoinHandle<()>,
}

impl MeshHandle {
    pub fn local(&self) -> SessionId {
        self.local
    }

    /// Feeds one relay frame to the mesh. Returns `false` once it has stopped.
    pub fn deliver(&self, msg: ServerMessage) -> bool {
        self.commands.send(MeshCommand::Relay(msg)).is_ok()
    }

    pub async fn snapshot(&self) -> MeshSnapshot {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(MeshCommand::Snapshot(reply)).is_err() {
            return MeshSnapshot::default();
        }
        rx.await.unwrap_or_default()
    }

    /// The relay connection dropped: close every link without leaving the room.
    pub async fn transport_lost(self) {
        let _ = self.commands.send(MeshCommand::TransportLost);
        self.join().await;
    }

    /// Leaves the room and closes every link.
    pub async fn shutdown(self) {
        let _ = self.commands.send(MeshCommand::Shutdown);
        self.join().await;
    }

    async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("Mesh task ended abnormally: {}", e);
        }
    }
}

/// Lifecycle supervisor for one (local session, room): keeps exactly one link
/// per remote member and reacts to membership changes and link failures.
pub struct Mesh {
    local: SessionId,
    config: MeshConfig,
    factory: Arc<dyn MediaFactory>,
    signaling: Arc<dyn SignalingOutput>,
    roster: BTreeMap<SessionId, Participant>,
    links: HashMap<SessionId, PeerLinkHandle>,
    attempts: HashMap<SessionId, u32>,
    unreachable: HashSet<SessionId>,
    next_link_id: u64,
    commands: mpsc::UnboundedReceiver<MeshCommand>,
    reports_tx: mpsc::UnboundedSender<LinkReport>,
    reports_rx: mpsc::UnboundedReceiver<LinkReport>,
    backup_tx: mpsc::UnboundedSender<(SessionId, u64)>,
    backup_rx: mpsc::UnboundedReceiver<(SessionId, u64)>,
    events: mpsc::UnboundedSender<MeshEvent>,
}

impl Mesh {
    /// Starts the supervisor, which joins the room right away.
    pub fn spawn(
        local: SessionId,
        config: MeshConfig,
        factory: Arc<dyn MediaFactory>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> (MeshHandle, mpsc::UnboundedReceiver<MeshEvent>) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let (backup_tx, backup_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let mesh = Self {
            local,
            config,
            factory,
            signaling,
            roster: BTreeMap::new(),
            links: HashMap::new(),
            attempts: HashMap::new(),
            unreachable: HashSet::new(),
            next_link_id: 0,
            commands,
            reports_tx,
            reports_rx,
            backup_tx,
            backup_rx,
            events,
        };
        let task = tokio::spawn(mesh.run());

        let handle = MeshHandle {
            local,
            commands: commands_tx,
            task,
        };
        (handle, events_rx)
    }

    async fn run(mut self) {
        info!("Mesh for {} in room '{}' started", self.local, self.config.room_id);
        self.signaling
            .join_room(&self.config.room_id, self.config.user_id.clone())
            .await;

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(MeshCommand::Relay(msg)) => self.handle_relay(msg).await,
                    Some(MeshCommand::Snapshot(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(MeshCommand::Shutdown) => {
                        self.close_all().await;
                        self.signaling.leave_room(&self.config.room_id).await;
                        break;
                    }
                    Some(MeshCommand::TransportLost) | None => {
                        warn!("Relay connection lost, closing all links");
                        self.close_all().await;
                        break;
                    }
                },
                Some(report) = self.reports_rx.recv() => self.handle_report(report).await,
                Some((peer, link_id)) = self.backup_rx.recv() => self.fire_backup(peer, link_id),
            }
        }

        info!("Mesh for {} in room '{}' stopped", self.local, self.config.room_id);
    }

    async fn handle_relay(&mut self, msg: ServerMessage) {
        if let Some(room) = msg.room_id() {
            if room != &self.config.room_id {
                debug!("Ignoring frame for room '{}'", room);
                return;
            }
        }

        match msg {
            ServerMessage::Peers { peers, .. } => self.sync_roster(peers).await,
            ServerMessage::PeerJoined { peer, .. } => self.on_peer_joined(peer).await,
            ServerMessage::PeerLeft { peer_id, .. } => self.on_peer_left(peer_id).await,
            ServerMessage::Signal { from, envelope, .. } => self.on_signal(from, envelope).await,
            ServerMessage::Welcome { .. } | ServerMessage::Pong | ServerMessage::Error { .. } => {}
        }
    }

    /// Full membership from the relay: sent after every join-room, including
    /// re-syncs. Members we have no live link with are (re)linked and offered to.
    async fn sync_roster(&mut self, peers: Vec<Participant>) {
        let current: HashSet<SessionId> = peers.iter().map(|p| p.session_id).collect();

        let vanished: Vec<SessionId> = self
            .roster
            .keys()
            .filter(|id| !current.contains(id))
            .copied()
            .collect();
        for id in vanished {
            self.on_peer_left(id).await;
        }

        for peer in peers {
            let id = peer.session_id;
            if id == self.local {
                continue;
            }
            self.admit(peer);

            if self.unreachable.contains(&id) {
                continue;
            }
            self.reap_closed(&id).await;
            if !self.links.contains_key(&id) {
                let link = self.spawn_link(id);
                link.send(LinkCommand::Initiate);
            }
        }
    }

    /// A newcomer initiates towards us. We only create the link, plus a
    /// delayed backup offer when we are the side whose offer would win.
    async fn on_peer_joined(&mut self, peer: Participant) {
        let id = peer.session_id;
        if id == self.local {
            return;
        }

        self.attempts.remove(&id);
        self.unreachable.remove(&id);
        self.admit(peer);

        self.reap_closed(&id).await;
        let link_id = match self.links.get(&id) {
            Some(link) => link.link_id(),
            None => self.spawn_link(id).link_id(),
        };

        if !is_polite(&self.local, &id) {
            if let Some(delay) = self.config.backup_offer_after {
                self.schedule_backup(id, link_id, delay);
            }
        }
    }

    async fn on_peer_left(&mut self, id: SessionId) {
        // The link goes first so nothing still queued for it can act afterwards.
        if let Some(link) = self.links.remove(&id) {
            link.close().await;
        }
        self.attempts.remove(&id);
        self.unreachable.remove(&id);

        if let Some(participant) = self.roster.remove(&id) {
            info!("{} left room '{}'", id, self.config.room_id);
            self.emit(MeshEvent::MemberLeft(participant));
        }
    }

    async fn on_signal(&mut self, from: SessionId, envelope: SignalEnvelope) {
        if !self.roster.contains_key(&from) {
            warn!("Dropping {:?}: {}", envelope.kind, ProtocolError::UnknownParticipant(from));
            return;
        }

        let signal = match Signal::try_from(envelope) {
            Ok(signal) => signal,
            Err(e) => {
                warn!("Dropping signal from {}: {}", from, ProtocolError::from(e));
                return;
            }
        };

        let cmd = match signal {
            Signal::Offer(offer) => LinkCommand::RemoteOffer(offer),
            Signal::Answer(answer) => LinkCommand::RemoteAnswer(answer),
            Signal::Candidate(candidate) => LinkCommand::RemoteCandidate(candidate),
        };

        self.reap_closed(&from).await;
        if !self.links.contains_key(&from) {
            self.spawn_link(from);
        }
        let delivered = self.links.get(&from).is_some_and(|link| link.send(cmd));
        if !delivered {
            debug!("Link to {} stopped before taking a signal", from);
        }
    }

    async fn handle_report(&mut self, report: LinkReport) {
        let peer = report.peer;
        let is_current = self
            .links
            .get(&peer)
            .is_some_and(|l| l.link_id() == report.link_id);

        match report.kind {
            LinkReportKind::Negotiation(state) => {
                self.emit(MeshEvent::Negotiation { peer, state });
            }
            LinkReportKind::Connection(state) => {
                if state == ConnectionState::Connected {
                    self.attempts.remove(&peer);
                }
                self.emit(MeshEvent::Connection { peer, state });
            }
            LinkReportKind::Failed(reason) if is_current => {
                self.on_link_failed(peer, reason).await;
            }
            LinkReportKind::Failed(_) | LinkReportKind::Closed => {}
        }
    }

    async fn on_link_failed(&mut self, peer: SessionId, reason: String) {
        let attempt = {
            let count = self.attempts.entry(peer).or_insert(0);
            *count += 1;
            *count
        };
        self.emit(MeshEvent::LinkFailed {
            peer,
            attempt,
            reason,
        });

        if let Some(link) = self.links.remove(&peer) {
            link.close().await;
        }

        if attempt < self.config.max_link_attempts {
            info!(
                "Link to {} failed (attempt {}), re-syncing room '{}'",
                peer, attempt, self.config.room_id
            );
            self.signaling
                .join_room(&self.config.room_id, self.config.user_id.clone())
                .await;
        } else {
            warn!("{} unreachable after {} attempts", peer, attempt);
            self.unreachable.insert(peer);
            self.emit(MeshEvent::PeerUnreachable {
                peer,
                attempts: attempt,
            });
        }
    }

    fn fire_backup(&mut self, peer: SessionId, link_id: u64) {
        match self.links.get(&peer) {
            Some(link) if link.link_id() == link_id => {
                link.send(LinkCommand::InitiateIfIdle);
            }
            _ => debug!("Backup offer for {} no longer needed", peer),
        }
    }

    fn schedule_backup(&self, peer: SessionId, link_id: u64, delay: Duration) {
        let tx = self.backup_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send((peer, link_id));
        });
    }

    fn admit(&mut self, peer: Participant) {
        let id = peer.session_id;
        if !self.roster.contains_key(&id) {
            info!("{} is in room '{}'", id, self.config.room_id);
            self.roster.insert(id, peer.clone());
            self.emit(MeshEvent::MemberJoined(peer));
        }
    }

    /// Drops a link that has already stopped on its own (failure) so a fresh
    /// one can take its place.
    async fn reap_closed(&mut self, peer: &SessionId) {
        if self.links.get(peer).is_some_and(|l| l.is_closed()) {
            if let Some(link) = self.links.remove(peer) {
                link.close().await;
            }
        }
    }

    fn spawn_link(&mut self, remote: SessionId) -> &PeerLinkHandle {
        self.next_link_id += 1;
        let ctx = LinkContext {
            link_id: self.next_link_id,
            room_id: self.config.room_id.clone(),
            local: self.local,
            remote,
            candidate_capacity: self.config.candidate_capacity,
            signaling: self.signaling.clone(),
            reports: self.reports_tx.clone(),
        };

        let handle = PeerLinkHandle::spawn(ctx, self.factory.clone());
        self.links.entry(remote).or_insert(handle)
    }

    async fn close_all(&mut self) {
        for (_, link) in self.links.drain() {
            link.close().await;
        }
    }

    fn snapshot(&self) -> MeshSnapshot {
        MeshSnapshot {
            members: self.roster.values().cloned().collect(),
            links: self
                .links
                .iter()
                .map(|(id, link)| (*id, link.state()))
                .collect(),
        }
    }

    fn emit(&self, event: MeshEvent) {
        let _ = self.events.send(event);
    }
}
