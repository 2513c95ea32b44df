use crate::error::MediaError;
use crate::link::{
    CandidateAction, LinkCommand, LinkReport, LinkReportKind, NegotiationState, Negotiator,
    OfferDecision,
};
use crate::media::{ConnectionState, MediaEvent, MediaFactory, MediaSession};
use crate::signaling::SignalingOutput;
use meshlink_core::{IceCandidate, Role, RoomId, SessionDescription, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything a link needs besides its media session.
#[derive(Clone)]
pub struct LinkContext {
    pub link_id: u64,
    pub room_id: RoomId,
    pub local: SessionId,
    pub remote: SessionId,
    pub candidate_capacity: usize,
    pub signaling: Arc<dyn SignalingOutput>,
    pub reports: mpsc::UnboundedSender<LinkReport>,
}

/// Owner's side of a running link.
pub struct PeerLinkHandle {
    link_id: u64,
    remote: SessionId,
    commands: mpsc::UnboundedSender<LinkCommand>,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<NegotiationState>,
    task: JoinHandle<()>,
}

impl PeerLinkHandle {
    pub fn spawn(ctx: LinkContext, factory: Arc<dyn MediaFactory>) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (state_tx, state) = watch::channel(NegotiationState::Idle);

        let link_id = ctx.link_id;
        let remote = ctx.remote;
        let task = tokio::spawn(run_link(ctx, factory, command_rx, shutdown_rx, state_tx));

        Self {
            link_id,
            remote,
            commands,
            shutdown,
            state,
            task,
        }
    }

    pub fn link_id(&self) -> u64 {
        self.link_id
    }

    pub fn remote(&self) -> SessionId {
        self.remote
    }

    /// Queues a command. Returns `false` if the link has already stopped.
    pub fn send(&self, cmd: LinkCommand) -> bool {
        self.commands.send(cmd).is_ok()
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == NegotiationState::Closed || self.task.is_finished()
    }

    pub async fn wait_for_state(&self, target: NegotiationState, timeout: Duration) -> bool {
        let mut state = self.state.clone();
        tokio::time::timeout(timeout, state.wait_for(|s| *s == target))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }

    /// Cancels whatever the link is doing, closes it, and waits until the
    /// media session is released.
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Link task for {} ended abnormally: {}", self.remote, e);
        }
    }
}

async fn run_link(
    ctx: LinkContext,
    factory: Arc<dyn MediaFactory>,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    mut shutdown: watch::Receiver<bool>,
    state_tx: watch::Sender<NegotiationState>,
) {
    let (media_tx, media_rx) = mpsc::unbounded_channel();

    let created = tokio::select! {
        biased;
        _ = shutdown.changed() => None,
        created = factory.create(ctx.local, ctx.remote, media_tx) => Some(created),
    };

    let media = match created {
        Some(Ok(media)) => media,
        Some(Err(e)) => {
            warn!("Could not create media session for {}: {}", ctx.remote, e);
            let _ = state_tx.send(NegotiationState::Closed);
            ctx.report(LinkReportKind::Failed(e.to_string()));
            ctx.report(LinkReportKind::Closed);
            return;
        }
        None => {
            let _ = state_tx.send(NegotiationState::Closed);
            ctx.report(LinkReportKind::Closed);
            return;
        }
    };

    let link = PeerLink::new(ctx, media, commands, media_rx, state_tx);
    link.run(shutdown).await;
}

/// Per-pair negotiation actor.
struct PeerLink {
    ctx: LinkContext,
    negotiator: Negotiator,
    media: Box<dyn MediaSession>,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    media_events: mpsc::UnboundedReceiver<MediaEvent>,
    state_tx: watch::Sender<NegotiationState>,
    published: NegotiationState,
}

impl PeerLink {
    fn new(
        ctx: LinkContext,
        media: Box<dyn MediaSession>,
        commands: mpsc::UnboundedReceiver<LinkCommand>,
        media_events: mpsc::UnboundedReceiver<MediaEvent>,
        state_tx: watch::Sender<NegotiationState>,
    ) -> Self {
        let role = Role::for_pair(&ctx.local, &ctx.remote);
        debug!("Link {} -> {} is {:?}", ctx.local, ctx.remote, role);

        Self {
            negotiator: Negotiator::new(role, ctx.candidate_capacity),
            ctx,
            media,
            commands,
            media_events,
            state_tx,
            published: NegotiationState::Idle,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Link {} -> {} started", self.ctx.local, self.ctx.remote);

        loop {
            let step = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                Some(cmd) = self.commands.recv() => Step::Command(cmd),
                Some(event) = self.media_events.recv() => Step::Media(event),
                else => break,
            };

            let result = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!("Link to {} cancelled mid-operation", self.ctx.remote);
                    break;
                }
                result = self.apply(step) => result,
            };

            if let Err(e) = result {
                warn!("Link to {} failed: {}", self.ctx.remote, e);
                self.ctx.report(LinkReportKind::Failed(e.to_string()));
                break;
            }
        }

        self.shutdown().await;
    }

    async fn apply(&mut self, step: Step) -> Result<(), MediaError> {
        match step {
            Step::Command(LinkCommand::Initiate) => self.initiate().await,
            Step::Command(LinkCommand::InitiateIfIdle) => {
                if self.negotiator.state() == NegotiationState::Idle {
                    info!("No offer from {} yet, sending backup offer", self.ctx.remote);
                    self.initiate().await
                } else {
                    Ok(())
                }
            }
            Step::Command(LinkCommand::RemoteOffer(offer)) => self.handle_remote_offer(offer).await,
            Step::Command(LinkCommand::RemoteAnswer(answer)) => {
                self.handle_remote_answer(answer).await
            }
            Step::Command(LinkCommand::RemoteCandidate(candidate)) => {
                self.handle_remote_candidate(candidate).await
            }
            Step::Media(event) => self.handle_media_event(event).await,
        }
    }

    async fn initiate(&mut self) -> Result<(), MediaError> {
        if let Err(e) = self.negotiator.begin_offer() {
            warn!("Ignoring initiate for {}: {}", self.ctx.remote, e);
            return Ok(());
        }
        self.publish_state();

        let offer = self.media.create_offer().await?;
        self.media.set_local_description(offer.clone()).await?;
        self.ctx
            .signaling
            .send_offer(&self.ctx.room_id, self.ctx.remote, offer)
            .await;

        self.negotiator.offer_sent();
        self.publish_state();
        Ok(())
    }

    async fn handle_remote_offer(&mut self, offer: SessionDescription) -> Result<(), MediaError> {
        let decision = match self.negotiator.on_remote_offer() {
            Ok(decision) => decision,
            Err(e) => {
                warn!("Dropping offer from {}: {}", self.ctx.remote, e);
                return Ok(());
            }
        };

        match decision {
            OfferDecision::Ignore => {
                info!("Offer collision with {}: keeping ours", self.ctx.remote);
                return Ok(());
            }
            OfferDecision::RollbackAndAccept => {
                info!("Offer collision with {}: rolling back ours", self.ctx.remote);
                self.media
                    .set_local_description(SessionDescription::rollback())
                    .await?;
                self.publish_state();
            }
            OfferDecision::Accept => {}
        }

        self.media.set_remote_description(offer).await?;
        let buffered = self.negotiator.remote_offer_applied();
        self.apply_candidates(buffered, false).await?;

        let answer = self.media.create_answer().await?;
        self.media.set_local_description(answer.clone()).await?;
        self.ctx
            .signaling
            .send_answer(&self.ctx.room_id, self.ctx.remote, answer)
            .await;

        self.negotiator.answer_sent();
        self.publish_state();
        Ok(())
    }

    async fn handle_remote_answer(&mut self, answer: SessionDescription) -> Result<(), MediaError> {
        if let Err(e) = self.negotiator.on_remote_answer() {
            warn!("Dropping answer from {}: {}", self.ctx.remote, e);
            return Ok(());
        }

        self.media.set_remote_description(answer).await?;
        // Candidates buffered behind an ignored offer keep their tolerance.
        let tolerant = self.negotiator.tolerates_candidate_failure();
        let buffered = self.negotiator.answer_applied();
        self.apply_candidates(buffered, tolerant).await?;

        self.publish_state();
        Ok(())
    }

    async fn handle_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), MediaError> {
        match self.negotiator.on_remote_candidate(candidate) {
            CandidateAction::Apply(candidate) => {
                let tolerant = self.negotiator.tolerates_candidate_failure();
                self.apply_candidate(candidate, tolerant).await
            }
            CandidateAction::Buffered { evicted } => {
                if let Some(dropped) = evicted {
                    warn!(
                        "Candidate buffer for {} is full, dropped {}",
                        self.ctx.remote, dropped.candidate
                    );
                }
                debug!(
                    "Buffered candidate from {} ({} pending)",
                    self.ctx.remote,
                    self.negotiator.buffered_candidates()
                );
                Ok(())
            }
            CandidateAction::Discard => Ok(()),
        }
    }

    async fn apply_candidates(
        &mut self,
        candidates: Vec<IceCandidate>,
        tolerant: bool,
    ) -> Result<(), MediaError> {
        if !candidates.is_empty() {
            debug!(
                "Applying {} buffered candidates from {}",
                candidates.len(),
                self.ctx.remote
            );
        }
        for candidate in candidates {
            self.apply_candidate(candidate, tolerant).await?;
        }
        Ok(())
    }

    async fn apply_candidate(
        &mut self,
        candidate: IceCandidate,
        tolerant: bool,
    ) -> Result<(), MediaError> {
        match self.media.add_candidate(candidate).await {
            Err(e) if tolerant => {
                debug!("Candidate of ignored offer from {} rejected: {}", self.ctx.remote, e);
                Ok(())
            }
            result => result,
        }
    }

    async fn handle_media_event(&mut self, event: MediaEvent) -> Result<(), MediaError> {
        match event {
            MediaEvent::LocalCandidate { candidate, .. } => {
                self.ctx
                    .signaling
                    .send_ice(&self.ctx.room_id, self.ctx.remote, candidate)
                    .await;
                Ok(())
            }
            MediaEvent::StateChanged { state, .. } => {
                self.ctx.report(LinkReportKind::Connection(state));
                if state == ConnectionState::Failed {
                    return Err(MediaError::ConnectionFailed(self.ctx.remote));
                }
                Ok(())
            }
        }
    }

    fn publish_state(&mut self) {
        let state = self.negotiator.state();
        if state == self.published {
            return;
        }
        self.published = state;
        self.state_tx.send_replace(state);
        self.ctx.report(LinkReportKind::Negotiation(state));
    }

    async fn shutdown(&mut self) {
        self.negotiator.close();
        if let Err(e) = self.media.close().await {
            debug!("Closing media for {}: {}", self.ctx.remote, e);
        }
        self.publish_state();
        self.ctx.report(LinkReportKind::Closed);
        info!("Link {} -> {} closed", self.ctx.local, self.ctx.remote);
    }
}

enum Step {
    Command(LinkCommand),
    Media(MediaEvent),
}

impl LinkContext {
    fn report(&self, kind: LinkReportKind) {
        let _ = self.reports.send(LinkReport {
            link_id: self.link_id,
            peer: self.remote,
            kind,
        });
    }
}
