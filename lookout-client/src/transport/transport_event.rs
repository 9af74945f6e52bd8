use crate::media::RemoteTrack;
use crate::peer::SlotKey;
use crate::transport::connector::{IceCandidate, LinkState, SessionDescription};

/// Events a peer link or its worker reports back to the dispatcher.
///
/// Every event names the slot it belongs to; the dispatcher drops events
/// whose slot has since been retired.
#[derive(Debug)]
pub enum TransportEvent {
    StateChanged(SlotKey, LinkState),

    /// A remote track arrived on the link.
    TrackAdded(SlotKey, RemoteTrack),

    /// A local ICE candidate to relay to the counterpart.
    CandidateGenerated(SlotKey, IceCandidate),

    /// A local offer or answer to relay to the counterpart.
    LocalDescription(SlotKey, SessionDescription),

    TracksAttached(SlotKey),

    NegotiationFailed(SlotKey, String),
}

impl TransportEvent {
    pub fn slot(&self) -> SlotKey {
        match self {
            TransportEvent::StateChanged(slot, _)
            | TransportEvent::TrackAdded(slot, _)
            | TransportEvent::CandidateGenerated(slot, _)
            | TransportEvent::LocalDescription(slot, _)
            | TransportEvent::TracksAttached(slot)
            | TransportEvent::NegotiationFailed(slot, _) => *slot,
        }
    }
}
