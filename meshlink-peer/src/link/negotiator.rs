use crate::error::ProtocolError;
use crate::link::candidate_buffer::CandidateBuffer;
use meshlink_core::{IceCandidate, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    Offering,
    AwaitingAnswer,
    Stable,
    Closed,
}

/// What to do with an incoming offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    /// No local offer outstanding; apply it and answer.
    Accept,
    /// Collision on the polite side: discard the local offer, then accept.
    RollbackAndAccept,
    /// Collision on the impolite side: drop the offer, ours stands.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateAction {
    Apply(IceCandidate),
    Buffered { evicted: Option<IceCandidate> },
    Discard,
}

/// Transition function of one link. Holds no I/O: the link actor asks it what
/// to do, performs the media operations, then reports back what happened.
#[derive(Debug)]
pub struct Negotiator {
    role: Role,
    state: NegotiationState,
    making_offer: bool,
    remote_offer_pending: bool,
    remote_description_set: bool,
    ignored_offer: bool,
    candidates: CandidateBuffer,
}

impl Negotiator {
    pub fn new(role: Role, candidate_capacity: usize) -> Self {
        Self {
            role,
            state: NegotiationState::Idle,
            making_offer: false,
            remote_offer_pending: false,
            remote_description_set: false,
            ignored_offer: false,
            candidates: CandidateBuffer::new(candidate_capacity),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn is_making_offer(&self) -> bool {
        self.making_offer
    }

    pub fn remote_offer_pending(&self) -> bool {
        self.remote_offer_pending
    }

    pub fn buffered_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Candidates belonging to an offer we ignored may be rejected by the
    /// media layer; that is expected and must not fail the link. Holds until
    /// our own offer is answered.
    pub fn tolerates_candidate_failure(&self) -> bool {
        self.ignored_offer
    }

    pub fn begin_offer(&mut self) -> Result<(), ProtocolError> {
        match self.state {
            NegotiationState::Idle => {
                self.making_offer = true;
                self.state = NegotiationState::Offering;
                Ok(())
            }
            NegotiationState::Closed => Err(ProtocolError::Closed),
            other => Err(ProtocolError::InvalidInitiate(other)),
        }
    }

    /// The local offer is set and on its way to the remote.
    pub fn offer_sent(&mut self) {
        self.making_offer = false;
        if self.state == NegotiationState::Offering {
            self.state = NegotiationState::AwaitingAnswer;
        }
    }

    pub fn is_collision(&self) -> bool {
        self.making_offer
            || matches!(
                self.state,
                NegotiationState::Offering | NegotiationState::AwaitingAnswer
            )
    }

    pub fn on_remote_offer(&mut self) -> Result<OfferDecision, ProtocolError> {
        if self.state == NegotiationState::Closed {
            return Err(ProtocolError::Closed);
        }

        let collision = self.is_collision();
        self.ignored_offer = collision && self.role == Role::Impolite;

        if self.ignored_offer {
            return Ok(OfferDecision::Ignore);
        }

        self.remote_offer_pending = true;
        if collision {
            self.making_offer = false;
            self.state = NegotiationState::Idle;
            Ok(OfferDecision::RollbackAndAccept)
        } else {
            Ok(OfferDecision::Accept)
        }
    }

    /// The remote offer is applied. Returns the buffered candidates to apply now.
    pub fn remote_offer_applied(&mut self) -> Vec<IceCandidate> {
        self.remote_description_set = true;
        self.candidates.drain()
    }

    pub fn answer_sent(&mut self) {
        self.remote_offer_pending = false;
        if self.state != NegotiationState::Closed {
            self.state = NegotiationState::Stable;
        }
    }

    pub fn on_remote_answer(&mut self) -> Result<(), ProtocolError> {
        match self.state {
            NegotiationState::AwaitingAnswer => Ok(()),
            NegotiationState::Closed => Err(ProtocolError::Closed),
            other => Err(ProtocolError::UnexpectedAnswer(other)),
        }
    }

    /// The remote answer is applied. Returns the buffered candidates to apply
    /// now; read `tolerates_candidate_failure` before calling, it is cleared here.
    pub fn answer_applied(&mut self) -> Vec<IceCandidate> {
        self.state = NegotiationState::Stable;
        self.ignored_offer = false;
        self.remote_description_set = true;
        self.candidates.drain()
    }

    pub fn on_remote_candidate(&mut self, candidate: IceCandidate) -> CandidateAction {
        if self.state == NegotiationState::Closed {
            return CandidateAction::Discard;
        }
        if self.remote_description_set {
            return CandidateAction::Apply(candidate);
        }
        CandidateAction::Buffered {
            evicted: self.candidates.push(candidate),
        }
    }

    /// Idempotent. Returns `true` on the first call.
    pub fn close(&mut self) -> bool {
        if self.state == NegotiationState::Closed {
            return false;
        }
        self.state = NegotiationState::Closed;
        self.making_offer = false;
        self.remote_offer_pending = false;
        self.candidates.clear();
        true
    }
}
