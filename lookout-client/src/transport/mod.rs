mod connection_wrapper;
mod connector;
mod transport_event;

pub use connection_wrapper::{WebRtcConnector, WebRtcLink};
pub use connector::{IceCandidate, LinkState, PeerConnector, PeerLink, SdpKind, SessionDescription};
pub use transport_event::TransportEvent;
