use crate::link::NegotiationState;
use crate::media::ConnectionState;
use meshlink_core::{IceCandidate, SessionDescription, SessionId};

/// Operations queued on a link, applied one at a time in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    Initiate,
    /// Backup offer: only acts if nothing has been negotiated yet.
    InitiateIfIdle,
    RemoteOffer(SessionDescription),
    RemoteAnswer(SessionDescription),
    RemoteCandidate(IceCandidate),
}

/// What a link tells its supervisor. `link_id` tells reports of a replaced
/// link apart from those of its successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub link_id: u64,
    pub peer: SessionId,
    pub kind: LinkReportKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkReportKind {
    Negotiation(NegotiationState),
    Connection(ConnectionState),
    Failed(String),
    Closed,
}
